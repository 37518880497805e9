use std::{
    error::Error,
    io,
    net::{SocketAddr, TcpStream},
    process,
};

use clap::Parser;

use ferry::protocol::SERVER_ENDPOINT;
use ferry::wire::header::Endpoint;
use ferry::{AsyncPoll, Command, FileClient, FileHandle, OperationId, StreamTransport, prompt};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of a running ferry server
    address: SocketAddr,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let stream = TcpStream::connect(cli.address)?;
    let transport = StreamTransport::new(stream);
    let mut client = FileClient::new(transport, SERVER_ENDPOINT, Endpoint(process::id()));

    let stdio = io::stdin();
    let stdout = io::stdout();

    loop {
        let command = match prompt(stdio.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let outcome = match command {
            Command::Exit => break,
            Command::Open { path, flags } => client
                .open(path.as_bytes(), flags)
                .map(|handle| format!("handle {handle}")),
            Command::Read {
                handle,
                offset,
                max_bytes,
            } => client
                .read(FileHandle(handle), offset, max_bytes)
                .map(|data| format!("{} bytes: {}", data.len(), String::from_utf8_lossy(&data))),
            Command::Write {
                handle,
                offset,
                data,
            } => client
                .write(FileHandle(handle), offset, data.as_bytes())
                .map(|count| format!("wrote {count} bytes")),
            Command::Size { handle } => client
                .size(FileHandle(handle))
                .map(|size| format!("{size} bytes")),
            Command::Close { handle } => client
                .close(FileHandle(handle))
                .map(|_| "closed".to_string()),
            Command::ReadAsync {
                handle,
                offset,
                max_bytes,
            } => client
                .read_async(FileHandle(handle), offset, max_bytes)
                .map(|operation| format!("operation {operation}")),
            Command::Poll { operation } => {
                client
                    .poll_async(OperationId(operation))
                    .map(|state| match state {
                        AsyncPoll::Pending => "pending".to_string(),
                        AsyncPoll::Complete { data, error } if error.is_ok() => {
                            format!("complete, {} bytes: {}", data.len(), String::from_utf8_lossy(&data))
                        }
                        AsyncPoll::Complete { error, .. } => format!("complete with error: {error}"),
                    })
            }
        };

        match outcome {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("call error: {e}"),
        }
    }

    Ok(())
}
