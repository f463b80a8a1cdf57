// mailverify
// Copyright (C) 2024 mailverify contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The SMTP prober: speaks the wire protocol directly over a buffered
//! TCP stream so it can inspect the exact reply code and free text of a
//! `RCPT TO` response, across the ordered port list `{25, 587, 2525}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::error::ProbeTransportError;
use crate::verdict::ProbeOutcome;

/// The ordered ports the prober walks: 25 is widely blocked outbound, 587
/// and 2525 are common alternates that still prove the MX is reachable.
pub const PROBE_PORTS: [u16; 3] = [25, 587, 2525];

const BLOCK_KEYWORDS: [&str; 7] = [
    "block",
    "denied",
    "policy",
    "spam",
    "sender",
    "verify",
    "verification",
];

/// Probes one address against one MX host. A trait so tests can script
/// responses without opening a socket.
#[async_trait]
pub trait SmtpProber: Send + Sync {
    async fn probe(&self, address: &str, mx_host: &str) -> ProbeOutcome;
}

/// The real prober: connects over TCP, attempts STARTTLS opportunistically,
/// and classifies the RCPT reply per the spec's code/keyword table.
pub struct TcpSmtpProber {
    pub ports: Vec<u16>,
    pub per_op_timeout: Duration,
    pub mail_from: String,
    pub helo_name: String,
}

impl Default for TcpSmtpProber {
    fn default() -> Self {
        TcpSmtpProber {
            ports: PROBE_PORTS.to_vec(),
            per_op_timeout: Duration::from_secs(3),
            mail_from: "test@example.com".to_string(),
            helo_name: local_fqdn(),
        }
    }
}

fn local_fqdn() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[async_trait]
impl SmtpProber for TcpSmtpProber {
    async fn probe(&self, address: &str, mx_host: &str) -> ProbeOutcome {
        let mut last_error: Option<ProbeTransportError> = None;
        let mut saw_timeout = false;

        for &port in &self.ports {
            match self.probe_port(address, mx_host, port).await {
                Ok(outcome) => return outcome,
                Err(err) => {
                    if matches!(err, ProbeTransportError::Timeout(_)) {
                        saw_timeout = true;
                    }
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            ProbeTransportError::Other("no ports configured".to_string())
        });

        if saw_timeout {
            return ProbeOutcome::UnknownTimeout(err.to_string());
        }

        match err {
            ProbeTransportError::Timeout(m) => ProbeOutcome::UnknownTimeout(m),
            ProbeTransportError::Refused(m) => ProbeOutcome::UnknownRefused(m),
            ProbeTransportError::Other(m) => ProbeOutcome::Unknown(m),
        }
    }
}

/// Anything that can be both read and written asynchronously — lets the
/// prober treat a plaintext `TcpStream` and a `TlsStream` uniformly once
/// STARTTLS has upgraded the connection.
trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

struct SmtpReply {
    code: u16,
    lines: Vec<String>,
}

impl SmtpReply {
    fn message(&self) -> String {
        self.lines.join(" ")
    }
}

impl TcpSmtpProber {
    async fn probe_port(
        &self,
        address: &str,
        mx_host: &str,
        port: u16,
    ) -> Result<ProbeOutcome, ProbeTransportError> {
        let tcp = timeout(self.per_op_timeout, TcpStream::connect((mx_host, port)))
            .await
            .map_err(|_| ProbeTransportError::Timeout(format!("connect to {mx_host}:{port}")))?
            .map_err(|e| ProbeTransportError::from_io(&e))?;

        let mut reader = BufReader::new(Box::new(tcp) as Box<dyn Stream>);

        let greeting = self.read_reply(&mut reader).await?;
        if greeting.code != 220 {
            return Err(ProbeTransportError::Other(format!(
                "unexpected greeting {} from {mx_host}:{port}",
                greeting.code
            )));
        }

        self.write_line(&mut reader, &format!("EHLO {}", self.helo_name))
            .await?;
        let ehlo_reply = self.read_reply(&mut reader).await?;
        let starttls_offered = ehlo_reply
            .lines
            .iter()
            .any(|l| l.trim().eq_ignore_ascii_case("STARTTLS"));

        let mut reader = if starttls_offered {
            match self.try_starttls(reader, mx_host).await? {
                Some(mut secured) => {
                    self.write_line(&mut secured, &format!("EHLO {}", self.helo_name))
                        .await?;
                    let _ = self.read_reply(&mut secured).await?;
                    secured
                }
                None => reader,
            }
        } else {
            reader
        };

        self.write_line(&mut reader, &format!("MAIL FROM:<{}>", self.mail_from))
            .await?;
        let _mail_reply = self.read_reply(&mut reader).await?;

        self.write_line(&mut reader, &format!("RCPT TO:<{address}>"))
            .await?;
        let rcpt_reply = self.read_reply(&mut reader).await?;

        // Best-effort QUIT; the outcome is already decided from RCPT.
        let _ = self.write_line(&mut reader, "QUIT").await;

        Ok(classify_rcpt_reply(&rcpt_reply))
    }

    /// Sends `STARTTLS` and, if the server agrees, performs the TLS
    /// handshake. Returns `Ok(None)` when STARTTLS is declined (any
    /// non-2xx reply) so the caller keeps using the existing cleartext
    /// reader. A handshake failure after the server agreed is reported as
    /// a transport error for this port — the plaintext reader can't be
    /// trusted once the peer expects a TLS record layer.
    async fn try_starttls(
        &self,
        mut reader: BufReader<Box<dyn Stream>>,
        mx_host: &str,
    ) -> Result<Option<BufReader<Box<dyn Stream>>>, ProbeTransportError> {
        self.write_line(&mut reader, "STARTTLS").await?;
        let reply = self.read_reply(&mut reader).await?;
        if reply.code != 220 {
            return Ok(None);
        }

        let inner = reader.into_inner();
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(mx_host.to_string())
            .map_err(|_| ProbeTransportError::Other(format!("invalid TLS server name {mx_host}")))?;

        let tls_stream = timeout(self.per_op_timeout, connector.connect(server_name, inner))
            .await
            .map_err(|_| ProbeTransportError::Timeout("STARTTLS handshake".to_string()))?
            .map_err(|e| ProbeTransportError::Other(format!("STARTTLS handshake failed: {e}")))?;

        Ok(Some(BufReader::new(Box::new(tls_stream) as Box<dyn Stream>)))
    }

    async fn write_line(
        &self,
        stream: &mut BufReader<Box<dyn Stream>>,
        line: &str,
    ) -> Result<(), ProbeTransportError> {
        timeout(self.per_op_timeout, async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ProbeTransportError::Timeout(format!("writing {line}")))?
        .map_err(|e| ProbeTransportError::from_io(&e))
    }

    async fn read_reply(
        &self,
        stream: &mut BufReader<Box<dyn Stream>>,
    ) -> Result<SmtpReply, ProbeTransportError> {
        timeout(self.per_op_timeout, read_reply_inner(stream))
            .await
            .map_err(|_| ProbeTransportError::Timeout("reading SMTP reply".to_string()))?
    }
}

async fn read_reply_inner(
    stream: &mut BufReader<Box<dyn Stream>>,
) -> Result<SmtpReply, ProbeTransportError> {
    let mut code = 0u16;
    let mut lines = Vec::new();

    loop {
        let mut raw = String::new();
        let n = stream
            .read_line(&mut raw)
            .await
            .map_err(|e| ProbeTransportError::from_io(&e))?;
        if n == 0 {
            return Err(ProbeTransportError::Other(
                "connection closed before a complete reply".to_string(),
            ));
        }
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.len() < 4 {
            lines.push(line.to_string());
            break;
        }
        code = line[..3].parse().unwrap_or(code);
        lines.push(line[4..].to_string());
        if line.as_bytes()[3] == b' ' {
            break;
        }
    }

    Ok(SmtpReply { code, lines })
}

fn classify_rcpt_reply(reply: &SmtpReply) -> ProbeOutcome {
    let message = reply.message();
    let lower = message.to_lowercase();

    match reply.code {
        250 => ProbeOutcome::Valid(message),
        550 => {
            if BLOCK_KEYWORDS.iter().any(|w| lower.contains(w)) {
                ProbeOutcome::UnknownBlock(message)
            } else {
                ProbeOutcome::Invalid(message)
            }
        }
        450 | 451 | 452 => {
            ProbeOutcome::Unknown(format!("Greylisted / Rate Limited: {message}"))
        }
        530 => ProbeOutcome::UnknownAuth(message),
        code => {
            if lower.contains("authentication required") {
                ProbeOutcome::UnknownAuth(message)
            } else {
                ProbeOutcome::Unknown(format!("{code} {message}"))
            }
        }
    }
}

/// SMTP STARTTLS is opportunistic: we upgrade to get past plaintext-only
/// filtering middleboxes, not to authenticate the mail server's identity.
/// Certificate validation is therefore skipped deliberately.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> SmtpReply {
        SmtpReply {
            code,
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn classifies_250_as_valid() {
        assert!(matches!(
            classify_rcpt_reply(&reply(250, &["OK"])),
            ProbeOutcome::Valid(_)
        ));
    }

    #[test]
    fn classifies_550_with_policy_keyword_as_block() {
        let outcome = classify_rcpt_reply(&reply(550, &["5.7.1 blocked due to spam policy"]));
        assert!(matches!(outcome, ProbeOutcome::UnknownBlock(_)));
    }

    #[test]
    fn classifies_plain_550_as_invalid() {
        let outcome = classify_rcpt_reply(&reply(550, &["5.1.1 user unknown"]));
        assert!(matches!(outcome, ProbeOutcome::Invalid(_)));
    }

    #[test]
    fn classifies_451_as_unknown_greylist() {
        let outcome = classify_rcpt_reply(&reply(451, &["try again later"]));
        match outcome {
            ProbeOutcome::Unknown(msg) => assert!(msg.starts_with("Greylisted")),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn classifies_530_as_auth() {
        assert!(matches!(
            classify_rcpt_reply(&reply(530, &["5.7.0 authentication required"])),
            ProbeOutcome::UnknownAuth(_)
        ));
    }

    #[test]
    fn classifies_other_code_with_auth_keyword_as_auth() {
        let outcome = classify_rcpt_reply(&reply(554, &["Authentication required before RCPT"]));
        assert!(matches!(outcome, ProbeOutcome::UnknownAuth(_)));
    }

    #[test]
    fn classifies_unmapped_code_as_unknown_with_code_included() {
        let outcome = classify_rcpt_reply(&reply(421, &["service not available"]));
        match outcome {
            ProbeOutcome::Unknown(msg) => assert!(msg.contains("421")),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }
}
