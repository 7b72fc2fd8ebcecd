use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use lib_feed::SyntheticAdapter;
use project_tests::{connect, expect_close, next_frame, next_frame_until, points_per_series, start};

const CADENCE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn frames_arrive_on_cadence_with_all_three_series() -> Result<()> {
    let server = start(|| SyntheticAdapter::new(1000), CADENCE).await?;
    let mut client = connect(&server.url()).await?;

    let deadline = Instant::now() + Duration::from_millis(1050);
    let mut frames = Vec::new();
    while let Some(frame) = next_frame_until(&mut client, deadline).await? {
        frames.push(frame);
    }
    assert!(frames.len() >= 9, "only {} frames in ~1s", frames.len());

    let mut previous = 0;
    for frame in &frames {
        let counts = points_per_series(frame)?;
        let mut names: Vec<&str> = counts.iter().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["cpu", "disk", "memory"]);
        let len = counts[0].1;
        assert!(counts.iter().all(|(_, n)| *n == len), "uneven series in {}", frame);
        assert!(len >= previous);
        previous = len;
    }

    server.stop().await
}

#[tokio::test]
async fn clients_are_isolated_from_each_other() -> Result<()> {
    let server = start(|| SyntheticAdapter::new(1000), CADENCE).await?;

    let mut first = connect(&server.url()).await?;
    for _ in 0..3 {
        next_frame(&mut first, Duration::from_secs(2)).await?.expect("frame for first client");
    }

    // A fresh session starts from empty buffers.
    let mut second = connect(&server.url()).await?;
    let opening = next_frame(&mut second, Duration::from_secs(2)).await?.expect("opening frame");
    assert!(points_per_series(&opening)?.iter().all(|(_, n)| *n == 1));

    first.close(None).await?;
    drop(first);

    for _ in 0..5 {
        next_frame(&mut second, Duration::from_secs(2)).await?.expect("second client keeps streaming");
    }

    server.stop().await
}

#[tokio::test]
async fn health_route_answers_plain_http() -> Result<()> {
    let server = start(|| SyntheticAdapter::new(10), CADENCE).await?;

    let mut stream = TcpStream::connect(server.addr).await?;
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);
    assert!(response.ends_with("OK"));

    server.stop().await
}

#[tokio::test]
async fn shutdown_sends_close_frames() -> Result<()> {
    let server = start(|| SyntheticAdapter::new(10), CADENCE).await?;
    let mut client = connect(&server.url()).await?;
    next_frame(&mut client, Duration::from_secs(2)).await?.expect("first frame");

    server.trigger_shutdown();
    expect_close(&mut client, Duration::from_secs(3)).await?;

    server.stop().await
}
