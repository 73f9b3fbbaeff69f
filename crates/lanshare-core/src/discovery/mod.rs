//! Session discovery over mDNS/DNS-SD.
//!
//! A host announces its session as a service instance named after the
//! session code:
//!
//! ```text
//! instance:  <code>._lanshare._tcp.local.
//! host:      <code>.local.
//! TXT:       code=<code>, version=<protocol version>
//! ```
//!
//! Peers browse the service type for a bounded time and pick the instance
//! whose code matches. An announcement only says where a session lives; what
//! it offers is learned by probing it over HTTP.
//!
//! Clients resolve codes through the [`SessionLookup`] trait, implemented by
//! [`ServiceRegistry`] (multicast) and [`StaticDirectory`] (a fixed table, for
//! direct-address use and tests).

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use crate::code::SessionCode;
use crate::error::{Error, Result};
use crate::protocol::Role;

/// mDNS service type for LanShare.
pub const SERVICE_TYPE: &str = "_lanshare._tcp.local.";

/// TXT record keys for service properties.
pub mod txt_keys {
    /// Session code key
    pub const CODE: &str = "code";
    /// Protocol version key
    pub const VERSION: &str = "version";
}

/// How long to wait for the daemon to confirm an unregister or shutdown.
const DAEMON_ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// A session registered by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session code
    pub code: SessionCode,
    /// What the session offers
    pub role: Role,
    /// Announced IPv4 address
    pub address: Ipv4Addr,
    /// Announced HTTP port
    pub port: u16,
}

impl Session {
    /// Announced socket address.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }

    /// HTTP URL of the session.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.socket_addr())
    }
}

/// What a lookup yields. Carries no role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Session code
    pub code: SessionCode,
    /// Where the session listens
    pub address: SocketAddrV4,
}

impl Announcement {
    /// Base URL for requests against the session.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    fn from_service_info(info: &ServiceInfo) -> Option<Self> {
        let code = info
            .get_properties()
            .get(txt_keys::CODE)
            .map(|p| p.val_str().to_string())
            .or_else(|| {
                info.get_fullname()
                    .strip_suffix(&format!(".{SERVICE_TYPE}"))
                    .map(str::to_string)
            })
            .and_then(|raw| SessionCode::parse(&raw).ok())?;

        let ip = info.get_addresses().iter().find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })?;

        Some(Self {
            code,
            address: SocketAddrV4::new(ip, info.get_port()),
        })
    }
}

/// Resolves session codes to announcements.
pub trait SessionLookup: Send + Sync {
    /// Look a code up. `Ok(None)` means nothing answered.
    fn lookup(
        &self,
        code: &SessionCode,
    ) -> impl Future<Output = Result<Option<Announcement>>> + Send;
}

impl<T: SessionLookup> SessionLookup for Arc<T> {
    fn lookup(
        &self,
        code: &SessionCode,
    ) -> impl Future<Output = Result<Option<Announcement>>> + Send {
        (**self).lookup(code)
    }
}

#[derive(Debug)]
struct Registration {
    full_name: String,
    address: SocketAddrV4,
}

/// mDNS registry of sessions.
///
/// Holds one daemon for both announcing and browsing. Registered sessions are
/// unregistered on [`release`](Self::release), [`shutdown`](Self::shutdown)
/// or drop.
pub struct ServiceRegistry {
    /// The mDNS daemon (wrapped in Option to support Drop)
    daemon: Option<ServiceDaemon>,
    registered: Mutex<HashMap<SessionCode, Registration>>,
    lookup_timeout: Duration,
    registration_check_timeout: Duration,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registered", &lock(&self.registered).len())
            .field("lookup_timeout", &self.lookup_timeout)
            .field("registration_check_timeout", &self.registration_check_timeout)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServiceRegistry {
    /// Create a registry with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the mDNS daemon cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_timeouts(
            Duration::from_secs(crate::DEFAULT_LOOKUP_TIMEOUT_SECS),
            Duration::from_secs(crate::DEFAULT_REGISTRATION_CHECK_SECS),
        )
    }

    /// Create a registry with explicit lookup and registration-check timeouts.
    ///
    /// A zero registration-check timeout skips the network check and only
    /// guards against codes this registry already holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the mDNS daemon cannot be created.
    pub fn with_timeouts(lookup_timeout: Duration, registration_check_timeout: Duration) -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| Error::Discovery(format!("mDNS daemon error: {e}")))?;

        Ok(Self {
            daemon: Some(daemon),
            registered: Mutex::new(HashMap::new()),
            lookup_timeout,
            registration_check_timeout,
        })
    }

    fn daemon(&self) -> Result<&ServiceDaemon> {
        self.daemon
            .as_ref()
            .ok_or_else(|| Error::Discovery("mDNS daemon already shutdown".to_string()))
    }

    /// Announce a session.
    ///
    /// An unspecified address is replaced by [`local_ipv4`].
    ///
    /// # Errors
    ///
    /// Returns `CodeExists` if this registry already holds `code` or another
    /// host answers for it within the registration-check timeout, and
    /// `Discovery` if the daemon rejects the service.
    pub async fn register(&self, code: &SessionCode, role: Role, address: SocketAddrV4) -> Result<Session> {
        if lock(&self.registered).contains_key(code) {
            return Err(Error::CodeExists(code.to_string()));
        }

        if !self.registration_check_timeout.is_zero()
            && self
                .browse_for(code, self.registration_check_timeout)
                .await?
                .is_some()
        {
            return Err(Error::CodeExists(code.to_string()));
        }

        let ip = if address.ip().is_unspecified() {
            local_ipv4()
        } else {
            *address.ip()
        };
        let address = SocketAddrV4::new(ip, address.port());

        let properties = [
            (txt_keys::CODE, code.as_str()),
            (txt_keys::VERSION, crate::PROTOCOL_VERSION),
        ];
        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            code.as_str(),
            &code.host_name(),
            ip.to_string().as_str(),
            address.port(),
            &properties[..],
        )
        .map_err(|e| Error::Discovery(format!("Failed to create mDNS service info: {e}")))?;
        let full_name = service_info.get_fullname().to_string();

        {
            let mut registered = lock(&self.registered);
            if registered.contains_key(code) {
                return Err(Error::CodeExists(code.to_string()));
            }
            registered.insert(
                code.clone(),
                Registration {
                    full_name: full_name.clone(),
                    address,
                },
            );
        }

        if let Err(e) = self.daemon().and_then(|daemon| {
            daemon
                .register(service_info)
                .map_err(|e| Error::Discovery(format!("Failed to register mDNS service: {e}")))
        }) {
            lock(&self.registered).remove(code);
            return Err(e);
        }

        tracing::info!(code = %code, role = %role, %address, "Registered session");

        Ok(Session {
            code: code.clone(),
            role,
            address: ip,
            port: address.port(),
        })
    }

    /// Unregister a session. Releasing an unknown session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Discovery` if the daemon refuses the unregister request.
    pub async fn release(&self, session: &Session) -> Result<()> {
        let Some(registration) = lock(&self.registered).remove(&session.code) else {
            return Ok(());
        };

        let receiver = self
            .daemon()?
            .unregister(&registration.full_name)
            .map_err(|e| Error::Discovery(format!("Failed to unregister mDNS service: {e}")))?;

        match tokio::time::timeout(DAEMON_ACK_TIMEOUT, receiver.recv_async()).await {
            Ok(Ok(status)) => {
                tracing::debug!(code = %session.code, ?status, "mDNS unregister completed");
            }
            Ok(Err(e)) => {
                tracing::debug!(code = %session.code, "mDNS unregister channel closed: {e}");
            }
            Err(_) => {
                tracing::debug!(code = %session.code, "mDNS unregister timed out");
            }
        }

        tracing::info!(code = %session.code, "Released session");
        Ok(())
    }

    /// Whether this registry currently holds `code`.
    #[must_use]
    pub fn is_registered(&self, code: &SessionCode) -> bool {
        lock(&self.registered).contains_key(code)
    }

    /// Release every session and stop the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be shut down.
    pub async fn shutdown(mut self) -> Result<()> {
        self.unregister_all();

        if let Some(daemon) = self.daemon.take() {
            let receiver = daemon
                .shutdown()
                .map_err(|e| Error::Discovery(format!("Failed to shutdown mDNS daemon: {e}")))?;

            match tokio::time::timeout(DAEMON_ACK_TIMEOUT, receiver.recv_async()).await {
                Ok(Ok(status)) => tracing::debug!(?status, "mDNS registry shutdown completed"),
                Ok(Err(_)) => tracing::debug!("mDNS registry shutdown channel disconnected"),
                Err(_) => tracing::debug!("mDNS registry shutdown timed out"),
            }
        }
        Ok(())
    }

    fn unregister_all(&self) {
        let registrations: Vec<_> = lock(&self.registered).drain().collect();
        let Some(daemon) = self.daemon.as_ref() else {
            return;
        };

        for (code, registration) in registrations {
            match daemon.unregister(&registration.full_name) {
                Ok(_) => tracing::debug!(code = %code, "Unregistered session"),
                Err(e) => tracing::debug!(code = %code, "Failed to unregister session: {e}"),
            }
        }
    }

    async fn browse_for(&self, code: &SessionCode, timeout: Duration) -> Result<Option<Announcement>> {
        let daemon = self.daemon()?;
        let receiver = daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| Error::Discovery(format!("Failed to browse mDNS services: {e}")))?;

        let deadline = tokio::time::Instant::now() + timeout;
        let found = loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break None;
            }

            match tokio::time::timeout(remaining, receiver.recv_async()).await {
                Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                    match Announcement::from_service_info(&info) {
                        Some(announcement) if announcement.code == *code => break Some(announcement),
                        Some(other) => {
                            tracing::debug!(code = %other.code, "Ignoring other session");
                        }
                        None => {
                            tracing::debug!(name = %info.get_fullname(), "Ignoring unparsable service");
                        }
                    }
                }
                Ok(Ok(_)) => {}
                Ok(Err(_)) | Err(_) => break None,
            }
        };

        if let Err(e) = daemon.stop_browse(SERVICE_TYPE) {
            tracing::debug!("Failed to stop mDNS browse: {e}");
        }

        Ok(found)
    }
}

impl SessionLookup for ServiceRegistry {
    async fn lookup(&self, code: &SessionCode) -> Result<Option<Announcement>> {
        let local = lock(&self.registered).get(code).map(|r| r.address);
        if let Some(address) = local {
            return Ok(Some(Announcement {
                code: code.clone(),
                address,
            }));
        }

        let found = self.browse_for(code, self.lookup_timeout).await?;
        match &found {
            Some(announcement) => {
                tracing::debug!(code = %code, address = %announcement.address, "Found session via mDNS");
            }
            None => tracing::debug!(code = %code, "No session answered"),
        }
        Ok(found)
    }
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        self.unregister_all();

        if let Some(daemon) = self.daemon.take() {
            match daemon.shutdown() {
                Ok(receiver) => match receiver.recv_timeout(DAEMON_ACK_TIMEOUT) {
                    Ok(status) => tracing::debug!(?status, "mDNS registry drop shutdown completed"),
                    Err(_) => tracing::debug!("mDNS registry drop shutdown timed out or disconnected"),
                },
                Err(e) => tracing::debug!("mDNS registry shutdown during drop: {e}"),
            }
        }
    }
}

/// A fixed code-to-address table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<SessionCode, SocketAddrV4>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    #[must_use]
    pub fn with(mut self, code: SessionCode, address: SocketAddrV4) -> Self {
        self.insert(code, address);
        self
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, code: SessionCode, address: SocketAddrV4) {
        self.entries.insert(code, address);
    }
}

impl SessionLookup for StaticDirectory {
    async fn lookup(&self, code: &SessionCode) -> Result<Option<Announcement>> {
        Ok(self.entries.get(code).map(|address| Announcement {
            code: code.clone(),
            address: *address,
        }))
    }
}

/// The LAN-facing IPv4 address of this host, or loopback if none is found.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
#[must_use]
pub fn local_ipv4() -> Ipv4Addr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .ok()
        .and_then(|addr| match addr.ip() {
            IpAddr::V4(v4) if !v4.is_unspecified() => Some(v4),
            _ => None,
        })
        .unwrap_or(Ipv4Addr::LOCALHOST)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> SessionCode {
        SessionCode::parse(s).unwrap()
    }

    #[test]
    fn test_service_type_format() {
        assert!(SERVICE_TYPE.ends_with(".local."));
        assert!(SERVICE_TYPE.starts_with("_lanshare._tcp"));
    }

    #[test]
    fn test_announcement_from_service_info() {
        let properties = [(txt_keys::CODE, "demo"), (txt_keys::VERSION, "1.0")];
        let info = ServiceInfo::new(
            SERVICE_TYPE,
            "demo",
            "demo.local.",
            "192.168.1.20",
            52530,
            &properties[..],
        )
        .unwrap();

        let announcement = Announcement::from_service_info(&info).unwrap();
        assert_eq!(announcement.code, code("demo"));
        assert_eq!(
            announcement.address,
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 52530)
        );
        assert_eq!(announcement.base_url(), "http://192.168.1.20:52530");
    }

    #[test]
    fn test_announcement_code_from_instance_name() {
        let properties: [(&str, &str); 0] = [];
        let info = ServiceInfo::new(
            SERVICE_TYPE,
            "Fallback",
            "fallback.local.",
            "10.0.0.5",
            8080,
            &properties[..],
        )
        .unwrap();

        let announcement = Announcement::from_service_info(&info).unwrap();
        assert_eq!(announcement.code, code("fallback"));
    }

    #[test]
    fn test_session_url() {
        let session = Session {
            code: code("demo"),
            role: Role::TextSender,
            address: Ipv4Addr::new(10, 0, 0, 2),
            port: 52530,
        };
        assert_eq!(session.url(), "http://10.0.0.2:52530");
    }

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let address = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4000);
        let directory = StaticDirectory::new().with(code("demo"), address);

        let found = directory.lookup(&code("DEMO")).await.unwrap().unwrap();
        assert_eq!(found.address, address);
        assert!(directory.lookup(&code("other")).await.unwrap().is_none());

        let shared = Arc::new(directory);
        assert!(shared.lookup(&code("demo")).await.unwrap().is_some());
    }

    #[test]
    fn test_local_ipv4_is_specified() {
        assert!(!local_ipv4().is_unspecified());
    }
}
