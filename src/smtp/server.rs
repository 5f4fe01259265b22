//! SMTP listener: accepts connections and drives one session per client

use crate::relay::MailHandler;
use crate::smtp::error::SmtpError;
use crate::smtp::handler::SmtpCommandHandler;
use crate::smtp::limits::SmtpLimits;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

use log::{debug, info, warn};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Listener handing finished transactions to the role strategy
#[derive(Clone)]
pub struct SmtpServer {
    /// Server hostname
    hostname: String,
    handler: Arc<dyn MailHandler>,
}

impl SmtpServer {
    pub fn new(hostname: &str, handler: Arc<dyn MailHandler>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            handler,
        }
    }

    /// Bind `addr` and serve until the listener fails (blocking)
    pub fn start(&self, addr: &str) -> Result<(), SmtpError> {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener)
    }

    /// Serve connections from an existing listener (blocking). Each client
    /// gets its own thread and its own session.
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        info!(
            "SMTP server listening on {} as {:?}",
            listener.local_addr()?,
            self.handler.role()
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = server.handle_client(stream) {
                            warn!("Error handling client: {e}");
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Handle a client connection
    fn handle_client(&self, mut stream: TcpStream) -> Result<(), SmtpError> {
        stream.set_read_timeout(Some(SmtpLimits::READ_TIMEOUT))?;
        if let Ok(peer) = stream.peer_addr() {
            debug!("connection from {peer}");
        }

        let command_handler = SmtpCommandHandler::new(&self.hostname, self.handler.as_ref());
        let mut session = SmtpSession::new();
        let mut reader = BufReader::new(stream.try_clone()?);

        self.send_response(&mut stream, &SmtpResponse::greeting(&self.hostname))?;

        let mut line_buffer = Vec::new();
        loop {
            line_buffer.clear();

            match reader.read_until(b'\n', &mut line_buffer) {
                Ok(0) => break, // Connection closed
                Ok(_) => {
                    if session.in_data_mode() {
                        if let Some(response) = self.handle_data_line(&line_buffer, &mut session) {
                            self.send_response(&mut stream, &response)?;
                        }
                        continue;
                    }

                    // Commands are ASCII; anything else is replaced rather than rejected
                    let line = String::from_utf8_lossy(&line_buffer);
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }

                    match command_handler.process_command(command, &mut session) {
                        Ok(response) => {
                            self.send_response(&mut stream, &response)?;
                            if response.closes_connection() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("rejected {command:?}: {e}");
                            self.send_response(&mut stream, &SmtpResponse::from(&e))?;
                        }
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.send_response(&mut stream, &SmtpResponse::timeout(&self.hostname))?;
                    break;
                }
                Err(e) => {
                    warn!("Error reading from client: {e}");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a raw line during DATA mode. Returns the reply once the
    /// terminating dot arrives.
    fn handle_data_line(&self, line: &[u8], session: &mut SmtpSession) -> Option<SmtpResponse> {
        if !SmtpSession::is_end_of_data(line) {
            session.push_data_line(line);
            return None;
        }

        match session.finish_data() {
            Ok(mut transaction) => {
                self.handler.complete(&mut transaction);
                debug!("transaction finished as {:?}", transaction.state);
                // Dropped transactions are still acknowledged
                Some(SmtpResponse::ok())
            }
            Err(e) => {
                debug!("data rejected: {e}");
                Some(SmtpResponse::from(&e))
            }
        }
    }

    /// Send a response to the client
    fn send_response(
        &self,
        stream: &mut TcpStream,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        let formatted = response.to_string();
        if response.lines.len() == 1 && formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            let truncated = SmtpResponse::new(response.code, "Response too long (truncated)");
            stream.write_all(truncated.to_string().as_bytes())?;
        } else {
            stream.write_all(formatted.as_bytes())?;
        }
        stream.flush()?;
        Ok(())
    }
}
