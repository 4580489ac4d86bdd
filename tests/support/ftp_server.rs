//! Scripted in-process FTP server for integration tests.
//!
//! Speaks just enough of the protocol for an anonymous passive-mode `RETR`:
//! USER, PASS, TYPE, CWD, PASV, RETR, QUIT. Behavior is fixed per server by
//! an [`FtpScript`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::socket_guard::should_skip_socket_bound_test;

/// How the server behaves.
#[derive(Debug, Clone, Default)]
pub struct FtpScript {
    /// Served files keyed by absolute path, e.g. `/pub/Router/fw.bin`.
    pub files: HashMap<String, Vec<u8>>,
    /// Answer `PASS` with 530.
    pub reject_login: bool,
    /// Send half of the file, close the data connection, then reply 426.
    pub truncate_transfer: bool,
    /// Close the control connection on `QUIT` without replying.
    pub drop_on_quit: bool,
}

impl FtpScript {
    pub fn serving(path: &str, content: &[u8]) -> Self {
        Self::default().with_file(path, content)
    }

    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    fn has_directory(&self, dir: &str) -> bool {
        if dir == "/" {
            return true;
        }
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files.keys().any(|path| path.starts_with(&prefix))
    }
}

/// Running server. Aborted on drop.
pub struct ScriptedFtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedFtpServer {
    /// Starts the server, or returns `None` when localhost sockets are unavailable.
    pub async fn start_or_skip(script: FtpScript) -> Option<Self> {
        if should_skip_socket_bound_test() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let commands = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let session_commands = Arc::clone(&commands);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = Arc::clone(&script);
                let commands = Arc::clone(&session_commands);
                tokio::spawn(async move {
                    let _ = serve_session(stream, &script, &commands).await;
                });
            }
        });

        Some(Self {
            addr,
            commands,
            handle,
        })
    }

    /// `ftp://` URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("ftp://127.0.0.1:{}{path}", self.addr.port())
    }

    /// Commands received so far, across all sessions.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for ScriptedFtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_session(
    stream: TcpStream,
    script: &FtpScript,
    commands: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let (read_half, mut control) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut cwd = "/".to_string();
    let mut passive: Option<TcpListener> = None;

    control.write_all(b"220 scripted ftp ready\r\n").await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        commands.lock().unwrap().push(line.clone());
        let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        match verb.to_ascii_uppercase().as_str() {
            "USER" => control.write_all(b"331 Password required\r\n").await?,
            "PASS" if script.reject_login => {
                control.write_all(b"530 Login incorrect\r\n").await?;
            }
            "PASS" => control.write_all(b"230 Logged in\r\n").await?,
            "TYPE" => control.write_all(b"200 Type set\r\n").await?,
            "CWD" if script.has_directory(arg) => {
                cwd = arg.trim_end_matches('/').to_string();
                if cwd.is_empty() {
                    cwd = "/".to_string();
                }
                control.write_all(b"250 Directory changed\r\n").await?;
            }
            "CWD" => control.write_all(b"550 No such directory\r\n").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                passive = Some(listener);
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    port / 256,
                    port % 256
                );
                control.write_all(reply.as_bytes()).await?;
            }
            "RETR" => {
                let path = if cwd == "/" {
                    format!("/{arg}")
                } else {
                    format!("{cwd}/{arg}")
                };
                let Some(listener) = passive.take() else {
                    control.write_all(b"425 Use PASV first\r\n").await?;
                    continue;
                };
                let Some(content) = script.files.get(&path) else {
                    control.write_all(b"550 No such file\r\n").await?;
                    continue;
                };

                control
                    .write_all(b"150 Opening BINARY mode data connection\r\n")
                    .await?;
                let (mut data, _) = listener.accept().await?;
                let sent = if script.truncate_transfer {
                    &content[..content.len() / 2]
                } else {
                    &content[..]
                };
                data.write_all(sent).await?;
                data.shutdown().await?;
                drop(data);

                if script.truncate_transfer {
                    control
                        .write_all(b"426 Connection closed; transfer aborted\r\n")
                        .await?;
                } else {
                    control.write_all(b"226 Transfer complete\r\n").await?;
                }
            }
            "QUIT" if script.drop_on_quit => return Ok(()),
            "QUIT" => {
                control.write_all(b"221 Bye\r\n").await?;
                return Ok(());
            }
            _ => control.write_all(b"502 Command not implemented\r\n").await?,
        }
    }
    Ok(())
}
