//! Connection roster for the UDP server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Assigning opaque session ids to new addresses
//! - Mapping datagram source addresses back to sessions
//! - Liveness tracking and timeout detection
//! - Capacity limits
//!
//! Game state lives in the store; this roster only knows who is connected and where.

use log::info;
use shared::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected client endpoint
#[derive(Debug)]
pub struct Client {
    /// Session id assigned by the server
    pub id: SessionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing has been heard from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Session ids are never reused within a process lifetime, so a late packet
/// for a dropped session can never be attributed to a newer one.
pub struct ClientManager {
    clients: HashMap<SessionId, Client>,
    next_client_id: u64,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<SessionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = SessionId::new(format!("session-{}", self.next_client_id));
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id.clone(), Client::new(client_id.clone(), addr));

        Some(client_id)
    }

    /// Removes a client, returning false if they were already gone
    pub fn remove_client(&mut self, client_id: &SessionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id.clone())
    }

    pub fn addr_of(&self, client_id: &SessionId) -> Option<SocketAddr> {
        self.clients.get(client_id).map(|client| client.addr)
    }

    /// Records activity for the client at `addr` and returns its id
    pub fn touch(&mut self, addr: SocketAddr) -> Option<SessionId> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.touch();
        Some(client.id.clone())
    }

    /// Removes and returns every client that went silent past the timeout
    pub fn check_timeouts(&mut self) -> Vec<SessionId> {
        let timed_out: Vec<SessionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.id.clone())
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// All client ids and addresses, used for broadcast fan-out
    pub fn get_client_addrs(&self) -> Vec<(SessionId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.id.clone(), client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(SessionId::new("session-1"), test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        let id1 = manager.add_client(test_addr()).unwrap();
        let id2 = manager.add_client(test_addr2()).unwrap();

        assert_ne!(id1, id2);
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_ids_not_reused() {
        let mut manager = manager(1);

        let id1 = manager.add_client(test_addr()).unwrap();
        manager.remove_client(&id1);
        let id2 = manager.add_client(test_addr()).unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let id1 = manager.add_client(test_addr()).unwrap();
        let id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(id1.clone()));
        assert_eq!(manager.addr_of(&id2), Some(test_addr2()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
        assert_eq!(manager.touch(unknown_addr), None);
        assert_eq!(manager.touch(test_addr()), Some(id1));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(4, Duration::from_millis(50));
        let quiet = manager.add_client(test_addr()).unwrap();
        let chatty = manager.add_client(test_addr2()).unwrap();

        if let Some(client) = manager.clients.get_mut(&quiet) {
            client.last_seen = Instant::now() - Duration::from_secs(1);
        }

        assert_eq!(manager.check_timeouts(), vec![quiet]);
        assert_eq!(manager.get_client_addrs(), vec![(chatty, test_addr2())]);
    }
}
