//! Shared in-memory fakes for engine tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use netconfd_dhcp::{LeaseSnapshot, LeaseTransport, TransportError};
use netconfd_net::{
    AddrLifetimes, FileStore, Ipv4Cidr, LinkHandle, NetError, Netlink, RouteEntry,
};

#[derive(Debug, Clone, PartialEq)]
pub enum NetCall {
    LinkByName(String),
    LinkUp,
    DelAddr(Ipv4Cidr),
    AddAddr(Ipv4Cidr, Option<AddrLifetimes>),
    DelRoute(RouteEntry),
    AddRoute(RouteEntry),
}

/// A fake kernel: mutations are applied to in-memory state, so a second
/// pass against the same fake observes the result of the first.
pub struct FakeKernel {
    pub link: Mutex<Option<LinkHandle>>,
    pub addrs: Mutex<Vec<Ipv4Cidr>>,
    pub routes: Mutex<Vec<RouteEntry>>,
    pub calls: Mutex<Vec<NetCall>>,
}

impl FakeKernel {
    pub fn with_link(link: LinkHandle) -> Self {
        Self {
            link: Mutex::new(Some(link)),
            addrs: Mutex::new(Vec::new()),
            routes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_link() -> Self {
        Self {
            link: Mutex::new(None),
            addrs: Mutex::new(Vec::new()),
            routes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<NetCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that mutate kernel state (everything except lookups).
    pub fn mutations(&self) -> Vec<NetCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, NetCall::LinkByName(_)))
            .collect()
    }

    fn record(&self, call: NetCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Netlink for FakeKernel {
    async fn link_by_name(&self, name: &str) -> Result<LinkHandle, NetError> {
        self.record(NetCall::LinkByName(name.to_string()));
        self.link
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| NetError::LinkNotFound(name.to_string()))
    }

    async fn list_ipv4_addrs(&self, _link: &LinkHandle) -> Result<Vec<Ipv4Cidr>, NetError> {
        Ok(self.addrs.lock().unwrap().clone())
    }

    async fn add_addr(
        &self,
        _link: &LinkHandle,
        cidr: Ipv4Cidr,
        lifetimes: Option<AddrLifetimes>,
    ) -> Result<(), NetError> {
        self.record(NetCall::AddAddr(cidr, lifetimes));
        self.addrs.lock().unwrap().push(cidr);
        Ok(())
    }

    async fn del_addr(&self, _link: &LinkHandle, cidr: Ipv4Cidr) -> Result<(), NetError> {
        self.record(NetCall::DelAddr(cidr));
        self.addrs.lock().unwrap().retain(|a| *a != cidr);
        Ok(())
    }

    async fn list_ipv4_routes(&self) -> Result<Vec<RouteEntry>, NetError> {
        Ok(self.routes.lock().unwrap().clone())
    }

    async fn add_route(&self, route: &RouteEntry) -> Result<(), NetError> {
        self.record(NetCall::AddRoute(*route));
        self.routes.lock().unwrap().push(*route);
        Ok(())
    }

    async fn del_route(&self, route: &RouteEntry) -> Result<(), NetError> {
        self.record(NetCall::DelRoute(*route));
        self.routes.lock().unwrap().retain(|r| r != route);
        Ok(())
    }

    async fn set_link_up(&self, _link: &LinkHandle) -> Result<(), NetError> {
        self.record(NetCall::LinkUp);
        if let Some(link) = self.link.lock().unwrap().as_mut() {
            link.is_up = true;
        }
        Ok(())
    }
}

/// Scripted lease transport: responses are consumed front to back; an empty
/// script times out every attempt.
#[derive(Default)]
pub struct ScriptedTransport {
    pub script: Mutex<Vec<Result<LeaseSnapshot, ()>>>,
    pub requests: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn always_failing() -> Self {
        Self::default()
    }

    pub fn with_leases(leases: Vec<LeaseSnapshot>) -> Self {
        Self {
            script: Mutex::new(leases.into_iter().map(Ok).collect()),
            requests: Mutex::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl LeaseTransport for ScriptedTransport {
    async fn request_lease(
        &self,
        _iface: &str,
        deadline: Duration,
    ) -> Result<LeaseSnapshot, TransportError> {
        *self.requests.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(TransportError::Timeout(deadline));
        }
        match script.remove(0) {
            Ok(lease) => Ok(lease),
            Err(()) => Err(TransportError::Timeout(deadline)),
        }
    }
}

/// In-memory [`FileStore`] with a write counter.
#[derive(Default)]
pub struct MemoryFiles {
    pub contents: Mutex<HashMap<PathBuf, Vec<u8>>>,
    pub writes: Mutex<usize>,
}

impl MemoryFiles {
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.contents.lock().unwrap().get(Path::new(path)).cloned()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl FileStore for MemoryFiles {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write(&self, path: &Path, data: &[u8], _mode: u32) -> io::Result<()> {
        *self.writes.lock().unwrap() += 1;
        self.contents
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.contents.lock().unwrap().contains_key(path)
    }
}

pub fn up_link(name: &str, index: u32) -> LinkHandle {
    LinkHandle {
        name: name.to_string(),
        index,
        mac: Some([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        is_up: true,
    }
}
