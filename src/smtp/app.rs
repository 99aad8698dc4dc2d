use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::Error;
use crate::report::Reporter;
use crate::smtp::parse::MessageParser;
use crate::smtp::state_machine::{Action, Reply, Session};

const BACKLOG: u32 = 128;
const READ_CHUNK: usize = 4096;

/// Cooperative stop signal for [`Listener::run`]. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a connection handler needs, shared read-only by all of them.
pub struct Context {
    pub host: String,
    pub service_name: String,
    pub idle_timeout: Option<Duration>,
    pub max_line_length: Option<usize>,
    pub parser: MessageParser,
    pub reporter: Arc<dyn Reporter>,
}

impl Context {
    pub fn new(config: &Config, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            host: config.host.clone(),
            service_name: config.service_name.clone(),
            idle_timeout: config.idle_timeout,
            max_line_length: config.max_line_length,
            parser: MessageParser::new(),
            reporter,
        }
    }

    fn greeting(&self) -> String {
        format!("220 {} {}", self.host, self.service_name)
    }
}

pub struct Listener {
    listener: TcpListener,
    context: Arc<Context>,
    shutdown: Shutdown,
    poll_interval: Duration,
    admission: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Binds `config.host:config.port` with address reuse turned on.
    pub async fn bind(config: &Config, reporter: Arc<dyn Reporter>) -> Result<Self, Error> {
        let listener = bind_reusable(&config.host, config.port).await?;
        let admission = config
            .max_connections
            .map(|permits| Arc::new(Semaphore::new(permits)));

        Ok(Listener {
            listener,
            context: Arc::new(Context::new(config, reporter)),
            shutdown: Shutdown::default(),
            poll_interval: config.poll_interval,
            admission,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Accepts connections until the shutdown flag is raised, spawning one
    /// task per connection. Sessions still running when this returns are
    /// left alone.
    pub async fn run(self) -> Result<(), Error> {
        info!("SMTP sink listening on {}", self.local_addr()?);
        if let Some(max) = self.admission.as_ref().map(|s| s.available_permits()) {
            info!("  - Max connections: {}", max);
        }

        while !self.shutdown.is_triggered() {
            let admission = self.admission.clone();
            let listener = &self.listener;
            let accepted = timeout(self.poll_interval, async move {
                let permit = match admission {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                (permit, listener.accept().await)
            })
            .await;

            let (permit, (stream, peer)) = match accepted {
                Err(_elapsed) => continue,
                Ok((_, Err(e))) => {
                    warn!("Couldn't accept connection: {}", e);
                    continue;
                }
                Ok((permit, Ok(conn))) => (permit, conn),
            };

            info!("New connection from: {}", peer);
            let context = self.context.clone();
            let span = info_span!("smtp-session", peer = %peer);
            tokio::spawn(
                async move {
                    match handle_connection(stream, &context).await {
                        Ok(delivered) => debug!(delivered, "session closed"),
                        Err(e) => error!("SMTP session failed: {}", e),
                    }
                    drop(permit);
                }
                .instrument(span),
            );
        }

        info!("SMTP sink stopped");
        Ok(())
    }
}

/// Binds and serves until `shutdown` is triggered.
pub async fn serve_smtp(
    config: &Config,
    reporter: Arc<dyn Reporter>,
    shutdown: Shutdown,
) -> Result<(), Error> {
    let mut listener = Listener::bind(config, reporter).await?;
    listener.shutdown = shutdown;
    listener.run().await
}

async fn bind_reusable(host: &str, port: u16) -> Result<TcpListener, Error> {
    let addr = lookup_host((host, port))
        .await
        .map_err(|source| Error::Resolve {
            host: host.to_owned(),
            source,
        })?
        .next()
        .ok_or_else(|| Error::NoAddress(host.to_owned()))?;

    let bind_error = |source: std::io::Error| {
        if source.kind() == std::io::ErrorKind::AddrInUse {
            Error::AddrInUse {
                host: host.to_owned(),
                port,
            }
        } else {
            Error::Bind {
                host: host.to_owned(),
                port,
                source,
            }
        }
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;
    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(addr).map_err(bind_error)?;
    socket.listen(BACKLOG).map_err(bind_error)
}

/// Runs one session over `stream` until QUIT, peer close or an error.
/// Returns how many messages were handed to the reporter.
pub async fn handle_connection<S>(mut stream: S, context: &Context) -> Result<usize, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(context.max_line_length);
    let result = drive(&mut stream, &mut session, context).await;
    if result.is_err() {
        session.close();
    }
    debug!(open_for = %(Local::now() - session.created_at()), "closing connection");
    let _ = stream.shutdown().await;
    result
}

async fn drive<S>(stream: &mut S, session: &mut Session, context: &Context) -> Result<usize, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_line(stream, &context.greeting()).await?;

    let mut delivered = 0;
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match context.idle_timeout {
            Some(idle) => timeout(idle, stream.read(&mut buf))
                .await
                .map_err(|_| Error::IdleTimeout(idle))??,
            None => stream.read(&mut buf).await?,
        };
        if n == 0 {
            debug!(state = ?session.state(), "peer closed connection");
            session.close();
            return Ok(delivered);
        }

        for line in session.feed(&buf[..n])? {
            match session.handle_line(&line) {
                Action::Ignore => {}
                Action::Reply(reply) => send_reply(stream, reply).await?,
                Action::Deliver(payload) => {
                    let message = context.parser.parse(payload);
                    context.reporter.report(session.envelope(), &message);
                    delivered += 1;
                    send_reply(stream, Reply::Ok).await?;
                }
                Action::Close => {
                    send_reply(stream, Reply::Bye).await?;
                    return Ok(delivered);
                }
            }
        }
    }
}

async fn send_reply<S>(stream: &mut S, reply: Reply) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    send_line(stream, &reply.to_string()).await
}

async fn send_line<S>(stream: &mut S, line: &str) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(format!("{}\r\n", line).as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    fn context(reporter: Arc<MemoryReporter>) -> Context {
        Context::new(&Config::default(), reporter)
    }

    async fn exchange(input: &'static [u8], context: Context) -> (Result<usize, Error>, String) {
        let (client, server) = duplex(64 * 1024);
        let handler = tokio::spawn(async move { handle_connection(server, &context).await });

        let (read_half, mut write_half) = tokio::io::split(client);
        write_half.write_all(input).await.unwrap();
        let mut output = String::new();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 {
            output.push_str(&line);
            line.clear();
        }
        (handler.await.unwrap(), output)
    }

    #[tokio::test]
    async fn replies_in_order_and_reports_once() {
        let reporter = Arc::new(MemoryReporter::new());
        let input = b"EHLO c\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n\
                      Subject: Test Run\r\n<strong>Acme Co</strong>\r\n.\r\nQUIT\r\n";
        let (result, output) = exchange(input, context(reporter.clone())).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            output,
            "220 localhost SMTP\r\n250 Hello\r\n250 OK\r\n250 OK\r\n\
             354 Send message, end with CRLF.CRLF\r\n250 OK\r\n221 Bye\r\n"
        );
        let deliveries = reporter.deliveries();
        assert_eq!(deliveries.len(), 1);
        let (envelope, message) = &deliveries[0];
        assert_eq!(envelope.sender.as_deref(), Some("<a@b>"));
        assert_eq!(message.subject.as_deref(), Some("Subject: Test Run"));
        assert_eq!(message.business_name.as_deref(), Some("Acme Co"));
    }

    #[tokio::test]
    async fn unrecognized_lines_get_no_reply() {
        let reporter = Arc::new(MemoryReporter::new());
        let (result, output) =
            exchange(b"STARTTLS\r\nNOOP\r\nQUIT\r\n", context(reporter.clone())).await;
        assert_eq!(result.unwrap(), 0);
        assert_eq!(output, "220 localhost SMTP\r\n221 Bye\r\n");
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn peer_close_mid_data_reports_nothing() {
        let reporter = Arc::new(MemoryReporter::new());
        let (client, server) = duplex(1024);
        let ctx = context(reporter.clone());
        let handler = tokio::spawn(async move { handle_connection(server, &ctx).await });

        let (read_half, mut write_half) = tokio::io::split(client);
        write_half
            .write_all(b"HELO c\r\nDATA\r\nhalf a mess")
            .await
            .unwrap();
        write_half.shutdown().await.unwrap();

        let mut output = String::new();
        BufReader::new(read_half)
            .read_to_string(&mut output)
            .await
            .unwrap();
        assert_eq!(
            output,
            "220 localhost SMTP\r\n250 Hello\r\n354 Send message, end with CRLF.CRLF\r\n"
        );
        assert_eq!(handler.await.unwrap().unwrap(), 0);
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn overlong_line_ends_session() {
        let reporter = Arc::new(MemoryReporter::new());
        let mut config = Config::default();
        config.max_line_length = Some(16);
        let ctx = Context::new(&config, reporter);
        let (result, output) =
            exchange(b"HELO a-very-long-client-name.example\r\n", ctx).await;
        assert!(matches!(result, Err(Error::LineTooLong { limit: 16 })));
        assert_eq!(output, "220 localhost SMTP\r\n");
    }

    #[tokio::test]
    async fn idle_timeout_ends_session() {
        let reporter = Arc::new(MemoryReporter::new());
        let mut config = Config::default();
        config.idle_timeout = Some(Duration::from_millis(50));
        let ctx = Context::new(&config, reporter);
        let (_client, server) = duplex(1024);
        let result = handle_connection(server, &ctx).await;
        assert!(matches!(result, Err(Error::IdleTimeout(_))));
    }
}
