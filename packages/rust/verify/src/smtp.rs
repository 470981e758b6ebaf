//! SMTP mailbox probe: a `RCPT TO` dialogue that never sends `DATA`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, instrument};

use leadcascade_shared::EmailVerificationConfig;

use crate::error::VerificationInfraError;

/// Reply code returned for one `RCPT TO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcptReply(pub u16);

impl RcptReply {
    /// 2xx: the server will take mail for this recipient.
    pub fn is_accepted(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 5xx: permanent rejection.
    pub fn is_rejected(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

/// Asks a mail exchanger whether it accepts the given recipients.
#[async_trait]
pub trait SmtpProber: Send + Sync {
    /// One reply per recipient, in order, from a single session with `mx_host`.
    async fn check_recipients(
        &self,
        mx_host: &str,
        recipients: &[String],
    ) -> Result<Vec<RcptReply>, VerificationInfraError>;
}

/// [`SmtpProber`] over a plain tokio TCP connection.
#[derive(Debug, Clone)]
pub struct TcpSmtpProber {
    port: u16,
    helo_name: String,
    mail_from: String,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl TcpSmtpProber {
    pub fn new(config: &EmailVerificationConfig) -> Self {
        Self {
            port: config.smtp_port,
            helo_name: config.helo_name.clone(),
            mail_from: config.mail_from.clone(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
        }
    }
}

/// One connected SMTP session.
struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl Session {
    /// Read a possibly multi-line reply and return its code.
    async fn reply(&mut self) -> Result<u16, VerificationInfraError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::time::timeout(self.timeout, self.reader.read_line(&mut line))
                .await
                .map_err(|_| VerificationInfraError::Timeout("waiting for SMTP reply".into()))?
                .map_err(|e| VerificationInfraError::Connect(e.to_string()))?;
            if read == 0 {
                return Err(VerificationInfraError::Protocol("connection closed".into()));
            }

            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| {
                    VerificationInfraError::Protocol(format!("malformed reply: {}", line.trim_end()))
                })?;
            // "250-..." continues, "250 ..." ends
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok(code);
            }
        }
    }

    async fn command(&mut self, command: &str) -> Result<u16, VerificationInfraError> {
        tokio::time::timeout(self.timeout, self.writer.write_all(format!("{command}\r\n").as_bytes()))
            .await
            .map_err(|_| VerificationInfraError::Timeout(format!("sending {command}")))?
            .map_err(|e| VerificationInfraError::Connect(e.to_string()))?;
        self.reply().await
    }

    /// Send a command that must succeed for the dialogue to continue.
    async fn expect_ok(&mut self, command: &str) -> Result<(), VerificationInfraError> {
        let code = self.command(command).await?;
        if (200..400).contains(&code) {
            Ok(())
        } else {
            Err(VerificationInfraError::Protocol(format!("{command} answered {code}")))
        }
    }
}

#[async_trait]
impl SmtpProber for TcpSmtpProber {
    #[instrument(skip_all, fields(mx = %mx_host, port = self.port))]
    async fn check_recipients(
        &self,
        mx_host: &str,
        recipients: &[String],
    ) -> Result<Vec<RcptReply>, VerificationInfraError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((mx_host, self.port)))
            .await
            .map_err(|_| VerificationInfraError::Timeout(format!("connecting to {mx_host}")))?
            .map_err(|e| VerificationInfraError::Connect(format!("{mx_host}: {e}")))?;

        let (read, writer) = stream.into_split();
        let mut session = Session {
            reader: BufReader::new(read),
            writer,
            timeout: self.command_timeout,
        };

        let greeting = session.reply().await?;
        if greeting != 220 {
            return Err(VerificationInfraError::Protocol(format!("greeting {greeting}")));
        }

        let ehlo = session.command(&format!("EHLO {}", self.helo_name)).await?;
        if !(200..300).contains(&ehlo) {
            session.expect_ok(&format!("HELO {}", self.helo_name)).await?;
        }
        session
            .expect_ok(&format!("MAIL FROM:<{}>", self.mail_from))
            .await?;

        let mut replies = Vec::with_capacity(recipients.len());
        for rcpt in recipients {
            let code = session.command(&format!("RCPT TO:<{rcpt}>")).await?;
            debug!(code, "RCPT reply");
            replies.push(RcptReply(code));
        }

        // Best effort, the answers are already in hand
        let _ = session.command("QUIT").await;
        Ok(replies)
    }
}
