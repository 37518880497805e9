use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use log::{debug, info, warn};

use super::dispatch::{Dispatcher, FileService};
use super::thread::ThreadPool;
use super::transport::{TransportError, read_frame};

const WORKERS: usize = 8;

/// TCP front end for a file service.
///
/// Each accepted connection is handed to a worker; within a connection,
/// frames are handled strictly in order — validate, invoke, reply — before
/// the next one is read. Concurrency across connections is safe because the
/// dispatcher is immutable and the service synchronizes its own state.
pub struct FileServer<S: FileService + Send + Sync + 'static> {
    address: SocketAddr,
    dispatcher: Arc<Dispatcher<S>>,
    pool: ThreadPool,
}

impl<S: FileService + Send + Sync + 'static> FileServer<S> {
    pub fn new(address: SocketAddr, service: S) -> Self {
        Self {
            address,
            dispatcher: Arc::new(Dispatcher::new(service)),
            pool: ThreadPool::new(WORKERS),
        }
    }

    pub fn listen(self) -> Result<(), TransportError> {
        info!("listening at {}", self.address);
        let listener = TcpListener::bind(self.address)?;

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    self.pool.execute(move || {
                        if let Err(e) = serve_connection(stream, dispatcher) {
                            warn!("connection failed: {e}");
                        }
                    });
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }
        }
        Ok(())
    }
}

fn serve_connection<S: FileService>(
    mut stream: TcpStream,
    dispatcher: Arc<Dispatcher<S>>,
) -> Result<(), TransportError> {
    if let Ok(peer) = stream.peer_addr() {
        debug!("serving {peer}");
    }

    loop {
        let frame = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(TransportError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("connection closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(reply) = dispatcher.dispatch(&frame) {
            stream.write_all(&reply)?;
            stream.flush()?;
        }
    }
}
