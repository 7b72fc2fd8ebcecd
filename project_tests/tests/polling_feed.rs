use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde_json::json;

use lib_feed::{FilePollingAdapter, PolledResource};
use project_tests::{connect, next_frame, start};

const POLL: Duration = Duration::from_millis(50);

/// Replaces `target` in one step so a poll never observes a half-written file.
fn write_atomically(target: &Path, contents: &str) -> Result<()> {
    let staging = target.with_extension("staging");
    fs::write(&staging, contents)?;
    fs::rename(&staging, target)?;
    Ok(())
}

#[tokio::test]
async fn waits_for_the_file_then_pushes_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cpu_temp.csv");
    let resource = PolledResource::new(&path)?;
    let server = start(move || FilePollingAdapter::new(resource.clone(), 1000), POLL).await?;
    let mut client = connect(&server.url()).await?;

    assert!(next_frame(&mut client, Duration::from_millis(300)).await?.is_none());

    write_atomically(
        &path,
        "2025-10-19 17:50:21.143882,10.5\n1697740221143,11.5\nnot,a-row\n",
    )?;
    let frame = next_frame(&mut client, Duration::from_secs(3)).await?.expect("frame after creation");
    assert_eq!(
        frame,
        json!({ "cpu_temp": [[1760896221143i64, 10.5], [1697740221143i64, 11.5]] })
    );

    assert!(next_frame(&mut client, Duration::from_millis(500)).await?.is_none());

    server.stop().await
}

#[tokio::test]
async fn touch_alone_is_not_a_change() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("load.csv");
    write_atomically(&path, "1,1.0\n2,2.0\n")?;
    let resource = PolledResource::new(&path)?;
    let server = start(move || FilePollingAdapter::new(resource.clone(), 1000), POLL).await?;
    let mut client = connect(&server.url()).await?;

    let first = next_frame(&mut client, Duration::from_secs(3)).await?.expect("initial frame");
    assert_eq!(first, json!({ "load": [[1, 1.0], [2, 2.0]] }));

    File::options()
        .write(true)
        .open(&path)?
        .set_modified(SystemTime::now() + Duration::from_secs(60))?;
    assert!(next_frame(&mut client, Duration::from_millis(500)).await?.is_none());

    write_atomically(&path, "1,1.0\n2,2.0\n3,4.5\n")?;
    let updated = next_frame(&mut client, Duration::from_secs(3)).await?.expect("frame after edit");
    assert_eq!(updated, json!({ "load": [[1, 1.0], [2, 2.0], [3, 4.5]] }));

    server.stop().await
}

#[tokio::test]
async fn late_client_gets_current_content_immediately() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("queue_depth.csv");
    write_atomically(&path, "10,3\n20,5\n")?;
    let resource = PolledResource::new(&path)?;
    let server = start(move || FilePollingAdapter::new(resource.clone(), 1000), POLL).await?;

    let mut early = connect(&server.url()).await?;
    next_frame(&mut early, Duration::from_secs(3)).await?.expect("early frame");

    let mut late = connect(&server.url()).await?;
    let frame = next_frame(&mut late, Duration::from_secs(3)).await?.expect("late frame");
    assert_eq!(frame, json!({ "queue_depth": [[10, 3.0], [20, 5.0]] }));

    server.stop().await
}
