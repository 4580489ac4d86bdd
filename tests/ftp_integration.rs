//! Integration tests for the FTP fetcher against a scripted FTP server.

mod support;

use std::sync::atomic::AtomicBool;

use fwfetch_core::download::{FetchError, FtpClient, FtpStage};
use support::ftp_server::{FtpScript, ScriptedFtpServer};
use tempfile::TempDir;

fn client() -> FtpClient {
    FtpClient::with_timeouts(5, 5)
}

#[tokio::test]
async fn test_ftp_fetch_writes_file_and_follows_protocol() {
    let content = b"firmware image bytes";
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/pub/Router/fw.bin", content)).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    let bytes = client()
        .fetch_to_path(
            &server.url("/pub/Router/fw.bin"),
            &destination,
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

    assert_eq!(bytes, content.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), content);

    let commands = server.commands();
    for expected in [
        "USER anonymous",
        "PASS anonymous@",
        "CWD /pub/Router",
        "TYPE I",
        "PASV",
        "RETR fw.bin",
        "QUIT",
    ] {
        assert!(
            commands.iter().any(|c| c == expected),
            "missing {expected:?} in {commands:?}"
        );
    }
}

#[tokio::test]
async fn test_ftp_fetch_preserves_binary_content() {
    let content: Vec<u8> = (0..2 * 1024 * 1024).map(|i: u32| (i % 251) as u8).collect();
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/fw/big.img", &content)).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("big.img");

    let bytes = client()
        .fetch_to_path(&server.url("/fw/big.img"), &destination, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(bytes, content.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), content);
}

#[tokio::test]
async fn test_ftp_fetch_root_level_file() {
    let Some(server) = ScriptedFtpServer::start_or_skip(FtpScript::serving("/fw.bin", b"root")).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    client()
        .fetch_to_path(&server.url("/fw.bin"), &destination, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"root");
    assert!(server.commands().iter().any(|c| c == "CWD /"));
}

#[tokio::test]
async fn test_ftp_fetch_rejected_login_reports_login_stage() {
    let script = FtpScript {
        reject_login: true,
        ..FtpScript::serving("/pub/fw.bin", b"data")
    };
    let Some(server) = ScriptedFtpServer::start_or_skip(script).await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    let result = client()
        .fetch_to_path(&server.url("/pub/fw.bin"), &destination, &AtomicBool::new(false))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::Ftp {
            stage: FtpStage::Login,
            ..
        })
    ));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_ftp_fetch_missing_directory_reports_cwd_stage() {
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/pub/fw.bin", b"data")).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    let result = client()
        .fetch_to_path(&server.url("/other/fw.bin"), &destination, &AtomicBool::new(false))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::Ftp {
            stage: FtpStage::Cwd,
            ..
        })
    ));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_ftp_fetch_retr_failure_after_login_leaves_no_file() {
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/pub/present.bin", b"data")).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("absent.bin");
    std::fs::write(&destination, b"stale file from an earlier run").unwrap();

    let result = client()
        .fetch_to_path(&server.url("/pub/absent.bin"), &destination, &AtomicBool::new(false))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::Ftp {
            stage: FtpStage::Retrieve,
            ..
        })
    ));
    assert!(!destination.exists(), "failed RETR must leave no file");
    assert!(server.commands().iter().any(|c| c == "PASS anonymous@"));
}

#[tokio::test]
async fn test_ftp_fetch_aborted_transfer_leaves_no_file() {
    let script = FtpScript {
        truncate_transfer: true,
        ..FtpScript::serving("/pub/fw.bin", &[7u8; 64 * 1024])
    };
    let Some(server) = ScriptedFtpServer::start_or_skip(script).await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    let result = client()
        .fetch_to_path(&server.url("/pub/fw.bin"), &destination, &AtomicBool::new(false))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::Ftp {
            stage: FtpStage::Retrieve,
            ..
        })
    ));
    assert!(
        !destination.exists(),
        "partial transfer must be removed after the server aborts"
    );
}

#[tokio::test]
async fn test_ftp_fetch_failed_quit_keeps_completed_file() {
    let script = FtpScript {
        drop_on_quit: true,
        ..FtpScript::serving("/pub/fw.bin", b"complete")
    };
    let Some(server) = ScriptedFtpServer::start_or_skip(script).await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");

    let bytes = client()
        .fetch_to_path(&server.url("/pub/fw.bin"), &destination, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(bytes, 8);
    assert_eq!(std::fs::read(&destination).unwrap(), b"complete");
}

#[tokio::test]
async fn test_ftp_fetch_overwrites_existing_file() {
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/pub/fw.bin", b"new")).await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw.bin");
    std::fs::write(&destination, b"old and longer content").unwrap();

    client()
        .fetch_to_path(&server.url("/pub/fw.bin"), &destination, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"new");
}

#[tokio::test]
async fn test_ftp_fetch_percent_encoded_path() {
    let Some(server) =
        ScriptedFtpServer::start_or_skip(FtpScript::serving("/pub/My Router/fw v2.bin", b"v2"))
            .await
    else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("fw v2.bin");

    client()
        .fetch_to_path(
            &server.url("/pub/My%20Router/fw%20v2.bin"),
            &destination,
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"v2");
}
