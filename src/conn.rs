//! Async connection driver over a datagram channel.
//!
//! A [`Conn`] owns an [`Engine`] and two tasks. The reader task feeds
//! received datagrams to the engine, the timer task fires retransmits and the
//! handshake timeout. Both flush the engine's output after every step.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

use crate::crypto::{KeyingMaterial, SrtpProfile};
use crate::engine::{Engine, Output};
use crate::message::CipherSuite;
use crate::{Config, Error};

/// Largest datagram we read from the channel.
const RECEIVE_MTU: usize = 8192;

/// Unreliable, message oriented transport below DTLS.
#[async_trait]
pub trait DatagramChannel: Send + Sync + 'static {
    /// Send one datagram.
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Receive one datagram into `buf`.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Stop the channel. Pending and later `recv` calls should fail.
    async fn close(&self) -> io::Result<()>;
}

/// A connected UDP socket.
#[async_trait]
impl DatagramChannel for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }

    async fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Connection status as published to observers.
#[derive(Debug, Clone)]
pub enum Status {
    Handshaking,
    Connected,
    Failed(Error),
    Closed,
}

impl Status {
    fn is_final(&self) -> bool {
        matches!(self, Status::Failed(_) | Status::Closed)
    }
}

struct Shared {
    engine: Mutex<Engine>,
    channel: Arc<dyn DatagramChannel>,
    status: watch::Sender<Status>,
    /// Woken when the engine may have a new deadline.
    rearm: Notify,
    app_tx: mpsc::Sender<Vec<u8>>,
    /// Flips to true once the connection is closing.
    closing: watch::Receiver<bool>,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fail(&self, e: Error) {
        warn!("Connection failed: {}", e);
        self.status.send_if_modified(|s| {
            if s.is_final() {
                return false;
            }
            *s = Status::Failed(e);
            true
        });
    }

    fn set_closed(&self) {
        self.status.send_if_modified(|s| {
            if s.is_final() {
                return false;
            }
            *s = Status::Closed;
            true
        });
    }

    /// Send everything the engine has queued, deliver application data and
    /// return the next deadline.
    ///
    /// The engine lock is released before anything is awaited.
    async fn flush(&self) -> Result<Instant, Error> {
        let mut packets = Vec::new();
        let mut received = Vec::new();
        let mut connected = false;

        let deadline = {
            let mut engine = self.engine();
            let now = Instant::now();
            loop {
                match engine.poll_output(now) {
                    Output::Packet(p) => packets.push(p),
                    Output::ApplicationData(d) => received.push(d),
                    Output::Connected => connected = true,
                    Output::Timeout(t) => break t,
                }
            }
        };

        for p in packets {
            trace!("Send datagram of {} bytes", p.len());
            self.channel.send(&p).await?;
        }

        if connected {
            self.status.send_if_modified(|s| {
                if matches!(s, Status::Handshaking) {
                    *s = Status::Connected;
                    true
                } else {
                    false
                }
            });
        }

        // A full queue must not hold up close.
        let mut closing = self.closing.clone();
        for d in received {
            if *closing.borrow() {
                debug!("Dropping application data on close");
                break;
            }
            tokio::select! {
                biased;
                _ = closing.changed() => {
                    debug!("Dropping application data on close");
                    break;
                }
                sent = self.app_tx.send(d) => {
                    if sent.is_err() {
                        debug!("Application data receiver gone");
                        break;
                    }
                }
            }
        }

        Ok(deadline)
    }
}

/// A DTLS connection driven by tokio tasks.
pub struct Conn {
    shared: Arc<Shared>,
    app_rx: tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    status_rx: watch::Receiver<Status>,
    close_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Conn {
    /// Run a client handshake over `channel`. Resolves once connected.
    pub async fn client<C: DatagramChannel>(channel: C, config: Arc<Config>) -> Result<Conn, Error> {
        Self::connect(Arc::new(channel), config, true).await
    }

    /// Run a server handshake over `channel`. Resolves once connected.
    pub async fn server<C: DatagramChannel>(channel: C, config: Arc<Config>) -> Result<Conn, Error> {
        Self::connect(Arc::new(channel), config, false).await
    }

    async fn connect(
        channel: Arc<dyn DatagramChannel>,
        config: Arc<Config>,
        is_client: bool,
    ) -> Result<Conn, Error> {
        let (app_tx, app_rx) = mpsc::channel(config.app_data_queue());
        let mut engine = Engine::new(config, is_client)?;
        engine.start(Instant::now())?;

        let (status, status_rx) = watch::channel(Status::Handshaking);
        let (close_tx, close_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            channel,
            status,
            rearm: Notify::new(),
            app_tx,
            closing: close_rx.clone(),
        });

        let reader = tokio::spawn(read_loop(shared.clone(), close_rx.clone()));
        let timer = tokio::spawn(timer_loop(shared.clone(), close_rx));

        let conn = Conn {
            shared,
            app_rx: tokio::sync::Mutex::new(app_rx),
            status_rx,
            close_tx,
            tasks: Mutex::new(vec![reader, timer]),
        };

        let mut rx = conn.status_rx.clone();
        let status = rx
            .wait_for(|s| !matches!(s, Status::Handshaking))
            .await
            .map(|s| s.clone())
            .unwrap_or(Status::Closed);

        match status {
            Status::Connected => Ok(conn),
            Status::Failed(e) => {
                conn.shutdown().await;
                Err(e)
            }
            Status::Closed | Status::Handshaking => {
                conn.shutdown().await;
                Err(Error::Closed)
            }
        }
    }

    /// Read one record of application data into `buf`.
    ///
    /// Fails with [`Error::BufferTooSmall`] if the record does not fit. The
    /// record is dropped in that case.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut app_rx = self.app_rx.lock().await;
        let mut status_rx = self.status_rx.clone();

        loop {
            if let Ok(data) = app_rx.try_recv() {
                return copy_record(&data, buf);
            }

            match &*status_rx.borrow_and_update() {
                Status::Failed(e) => return Err(e.clone()),
                Status::Closed => return Err(Error::Closed),
                _ => {}
            }

            tokio::select! {
                data = app_rx.recv() => match data {
                    Some(data) => return copy_record(&data, buf),
                    None => return Err(Error::Closed),
                },
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::Closed);
                    }
                }
            }
        }
    }

    /// Send `data` as one application data record.
    pub async fn write(&self, data: &[u8]) -> Result<usize, Error> {
        self.shared.engine().send_application_data(data)?;
        self.shared.flush().await?;
        Ok(data.len())
    }

    /// Send close_notify, stop both tasks and close the channel.
    pub async fn close(&self) -> Result<(), Error> {
        self.shared.engine().close();
        let _ = self.close_tx.send(true);
        let flushed = self.shared.flush().await;
        self.shutdown().await;
        flushed.map(|_| ())
    }

    async fn shutdown(&self) {
        self.shared.set_closed();
        let _ = self.close_tx.send(true);

        if let Err(e) = self.shared.channel.close().await {
            debug!("Channel close failed: {}", e);
        }

        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    pub fn status(&self) -> Status {
        self.status_rx.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    pub fn is_client(&self) -> bool {
        self.shared.engine().is_client()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status(), Status::Connected)
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.shared.engine().cipher_suite()
    }

    pub fn srtp_profile(&self) -> Option<SrtpProfile> {
        self.shared.engine().srtp_profile()
    }

    pub fn export_keying_material(&self, label: &str, len: usize) -> Result<KeyingMaterial, Error> {
        self.shared.engine().export_keying_material(label, len)
    }

    pub fn srtp_keying_material(&self) -> Result<Option<(KeyingMaterial, SrtpProfile)>, Error> {
        self.shared.engine().srtp_keying_material()
    }

    pub fn peer_certificates(&self) -> Vec<Vec<u8>> {
        self.shared.engine().peer_certificates().to_vec()
    }

    pub fn server_name(&self) -> Option<String> {
        self.shared.engine().server_name().map(|s| s.to_string())
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        let _ = self.close_tx.send(true);
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("status", &*self.status_rx.borrow())
            .finish()
    }
}

fn copy_record(data: &[u8], buf: &mut [u8]) -> Result<usize, Error> {
    if data.len() > buf.len() {
        return Err(Error::BufferTooSmall);
    }
    buf[..data.len()].copy_from_slice(data);
    Ok(data.len())
}

async fn read_loop(shared: Arc<Shared>, mut close_rx: watch::Receiver<bool>) {
    let mut buf = vec![0; RECEIVE_MTU];

    loop {
        let n = tokio::select! {
            biased;
            _ = close_rx.changed() => break,
            r = shared.channel.recv(&mut buf) => match r {
                Ok(n) => n,
                Err(e) => {
                    if !*close_rx.borrow() {
                        shared.fail(e.into());
                    }
                    break;
                }
            },
        };
        trace!("Received datagram of {} bytes", n);

        let (result, closed) = {
            let mut engine = shared.engine();
            let result = engine.handle_packet(&buf[..n], Instant::now());
            (result, engine.is_closed())
        };
        shared.rearm.notify_one();

        // Alerts queued by a failure still go out.
        let flushed = shared.flush().await;

        if let Err(e) = result.and(flushed) {
            shared.fail(e);
            break;
        }
        if closed {
            debug!("Peer closed the connection");
            shared.set_closed();
            break;
        }
    }

    trace!("Reader task stopped");
}

async fn timer_loop(shared: Arc<Shared>, mut close_rx: watch::Receiver<bool>) {
    loop {
        let deadline = match shared.flush().await {
            Ok(v) => v,
            Err(e) => {
                shared.fail(e);
                break;
            }
        };
        let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));

        tokio::select! {
            biased;
            _ = close_rx.changed() => break,
            _ = shared.rearm.notified() => continue,
            _ = sleep => {}
        }

        let result = shared.engine().handle_timeout(Instant::now());
        if let Err(e) = result {
            // The failure may have queued nothing, but try anyway.
            let _ = shared.flush().await;
            shared.fail(e);
            break;
        }
    }

    trace!("Timer task stopped");
}
