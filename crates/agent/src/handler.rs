//! Host event handler.
//!
//! Routes host events to the registration and turns the outcomes into
//! replies. Every event gets exactly one reply; failures become
//! `{"reply":"error"}` lines and never end the session.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use docscan_core::origin::resolve;
use docscan_core::{Error, Request};

use crate::error::HostError;
use crate::lifecycle::Registration;
use crate::protocol::{FetchParams, HostEvent, HostReply, StatusReply};

/// Serves one registration to a host.
#[derive(Debug)]
pub struct AgentHost {
    registration: Registration,
    origin: Url,
}

impl AgentHost {
    pub fn new(registration: Registration) -> Self {
        let origin = registration.agent().manifest().origin().clone();
        Self { registration, origin }
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Parse and handle one protocol line.
    pub async fn handle_line(&mut self, line: &str) -> HostReply {
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                tracing::warn!(error = %e, "malformed host event");
                HostReply::Error(HostError::from(e).into())
            }
        }
    }

    pub async fn handle(&mut self, event: HostEvent) -> HostReply {
        match self.dispatch(event).await {
            Ok(reply) => reply,
            Err(e) => HostReply::Error(e.into()),
        }
    }

    async fn dispatch(&mut self, event: HostEvent) -> Result<HostReply, HostError> {
        match event {
            HostEvent::Install => {
                let install = self.registration.install().await?;
                let activate = if install.skip_waiting && !self.registration.controls_clients() {
                    Some(self.registration.activate().await?)
                } else {
                    None
                };
                Ok(HostReply::Installed { install, activate })
            }
            HostEvent::Activate => Ok(HostReply::Activated(self.registration.activate().await?)),
            HostEvent::Fetch(params) => {
                let request = self.request_for(params)?;
                Ok(HostReply::Fetch(self.registration.dispatch_fetch(request).await.into()))
            }
            HostEvent::Status => {
                let generations = self.registration.agent().storage().keys().await?;
                Ok(HostReply::Status(StatusReply {
                    generation: self.registration.agent().version().to_string(),
                    state: self.registration.state(),
                    generations,
                }))
            }
        }
    }

    fn request_for(&self, params: FetchParams) -> Result<Request, HostError> {
        let url = resolve(&self.origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
        let mut request = Request::get(url).with_method(params.method).with_mode(params.mode);
        for (name, value) in params.headers {
            request = request.with_header(&name, value);
        }
        Ok(request)
    }

    /// Read events line by line until EOF, writing one reply line each.
    ///
    /// Events are handled in order and replies keep that order. A fetch
    /// that hangs on the network blocks the events behind it until the
    /// configured `timeout_ms` expires; with no timeout it blocks until the
    /// platform gives up.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let reply = self.handle_line(&line).await;
            let mut out = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }

        tracing::info!("host closed the event stream");
        Ok(())
    }
}
