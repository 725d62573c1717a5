//! Relay server
//!
//! One UDP socket, one task, no concurrency: a single receive per
//! iteration serializes every client interaction through the session
//! table. Routing is pure (bytes in, addressed bytes out) so the fan-out
//! discipline is testable without sockets.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::constants::MAX_PAYLOAD;
use crate::error::NetworkError;
use crate::protocol::{Packet, HEADER_LEN};

/// One connected peer. Slots are never removed, only marked dead; a
/// sender id therefore stays stable for the life of its session.
#[derive(Debug, Clone)]
struct PeerSession {
    id: u8,
    addr: SocketAddr,
    alive: bool,
}

/// Session table plus broadcast fan-out
pub struct RelayServer {
    sessions: Vec<PeerSession>,
    packets_relayed: u64,
    packets_dropped: u64,
}

impl RelayServer {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            packets_relayed: 0,
            packets_dropped: 0,
        }
    }

    /// Route one received datagram, returning the datagrams to transmit.
    /// Nothing in here is fatal; anomalies are logged and dropped.
    pub fn handle_datagram(
        &mut self,
        from: SocketAddr,
        datagram: &[u8],
    ) -> Vec<(SocketAddr, Bytes)> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("malformed datagram from {}: {}", from, e);
                self.packets_dropped += 1;
                return Vec::new();
            }
        };

        match packet {
            Packet::Hello => self.handle_hello(from),
            Packet::Data(_) | Packet::Bye { .. } => self.handle_relay(from, datagram, &packet),
            other => {
                tracing::warn!(
                    "unexpected {:?} packet from {}, dropping",
                    other.packet_type(),
                    from
                );
                self.packets_dropped += 1;
                Vec::new()
            }
        }
    }

    /// HELLO: register the peer, WELCOME it, announce it to the others.
    fn handle_hello(&mut self, from: SocketAddr) -> Vec<(SocketAddr, Bytes)> {
        // Ids are table indexes and a single wire byte; 256 sessions is
        // the hard ceiling of this protocol.
        if self.sessions.len() > u8::MAX as usize {
            tracing::warn!("{}: {}", from, NetworkError::SessionTableFull);
            self.packets_dropped += 1;
            return Vec::new();
        }

        let id = self.sessions.len() as u8;
        tracing::info!("client {} connected as {}", from, id);

        let mut out = Vec::new();
        out.push((from, Packet::Welcome { sender_id: id }.encode()));

        let join = Packet::Join { sender_id: id }.encode();
        for peer in &self.sessions {
            if peer.alive && peer.addr != from {
                out.push((peer.addr, join.clone()));
            }
        }

        self.sessions.push(PeerSession {
            id,
            addr: from,
            alive: true,
        });
        out
    }

    /// DATA/BYE: broadcast the verbatim bytes to every alive session
    /// except the sender, matched by socket address rather than by the
    /// claimed sender id.
    fn handle_relay(
        &mut self,
        from: SocketAddr,
        datagram: &[u8],
        packet: &Packet,
    ) -> Vec<(SocketAddr, Bytes)> {
        let bytes = Bytes::copy_from_slice(datagram);
        let out: Vec<_> = self
            .sessions
            .iter()
            .filter(|peer| peer.alive && peer.addr != from)
            .map(|peer| (peer.addr, bytes.clone()))
            .collect();
        self.packets_relayed += 1;

        if let Packet::Bye { sender_id } = packet {
            // The claimed id is trusted, as the original protocol does;
            // authorizing by source address is an open question.
            match self.sessions.get_mut(*sender_id as usize) {
                Some(peer) => {
                    peer.alive = false;
                    tracing::info!("client {} ({}) disconnected", from, peer.id);
                }
                None => tracing::warn!("BYE from {} for unknown id {}", from, sender_id),
            }
        }
        out
    }

    /// Count of sessions ever registered (dead slots included)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Serve forever on `socket`: one blocking receive per iteration,
    /// transient send/receive errors logged and skipped.
    pub async fn run(mut self, socket: UdpSocket) -> Result<(), NetworkError> {
        let local = socket
            .local_addr()
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        tracing::info!("relay serving on {}", local);

        let mut buf = [0u8; HEADER_LEN + MAX_PAYLOAD];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!("recv_from failed: {}", e);
                    continue;
                }
            };

            for (addr, bytes) in self.handle_datagram(from, &buf[..n]) {
                if let Err(e) = socket.send_to(&bytes, addr).await {
                    tracing::warn!("send_to {} failed: {}", addr, e);
                }
            }
        }
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DataPacket;

    fn addr(port: u16) -> SocketAddr {
        format!("10.0.0.{}:{}", port % 250 + 1, port).parse().unwrap()
    }

    /// HELLO from `who`, asserting and returning the assigned id
    fn join_relay(relay: &mut RelayServer, who: SocketAddr) -> u8 {
        let out = relay.handle_datagram(who, &Packet::Hello.encode());
        match Packet::decode(&out[0].1).unwrap() {
            Packet::Welcome { sender_id } => {
                assert_eq!(out[0].0, who);
                sender_id
            }
            other => panic!("expected WELCOME, got {:?}", other),
        }
    }

    #[test]
    fn test_hello_assigns_fresh_ids_and_joins_prior_peers() {
        let mut relay = RelayServer::new();

        assert_eq!(join_relay(&mut relay, addr(1000)), 0);

        let out = relay.handle_datagram(addr(1001), &Packet::Hello.encode());
        // WELCOME to the new peer plus JOIN to the one existing peer
        assert_eq!(out.len(), 2);
        assert_eq!(
            Packet::decode(&out[0].1).unwrap(),
            Packet::Welcome { sender_id: 1 }
        );
        assert_eq!(out[1].0, addr(1000));
        assert_eq!(
            Packet::decode(&out[1].1).unwrap(),
            Packet::Join { sender_id: 1 }
        );
        // The new session itself got no JOIN
        assert!(out.iter().skip(1).all(|(a, _)| *a != addr(1001)));
    }

    #[test]
    fn test_data_broadcast_excludes_sender() {
        let mut relay = RelayServer::new();
        let (a, b, c) = (addr(2000), addr(2001), addr(2002));
        join_relay(&mut relay, a);
        join_relay(&mut relay, b);
        join_relay(&mut relay, c);

        let data =
            Packet::Data(DataPacket::new(1, 0, Bytes::from_static(b"voice bytes"))).encode();
        let out = relay.handle_datagram(b, &data);

        let mut targets: Vec<_> = out.iter().map(|(addr, _)| *addr).collect();
        targets.sort();
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(targets, expected);
        // Byte-for-byte identical relaying
        assert!(out.iter().all(|(_, bytes)| *bytes == data));
    }

    #[test]
    fn test_bye_kills_slot_and_address_can_rejoin() {
        let mut relay = RelayServer::new();
        let (a, b, c) = (addr(3000), addr(3001), addr(3002));
        join_relay(&mut relay, a);
        join_relay(&mut relay, b);
        join_relay(&mut relay, c);

        // c (id 2) leaves; a and b still get the BYE broadcast
        let out = relay.handle_datagram(c, &Packet::Bye { sender_id: 2 }.encode());
        assert_eq!(out.len(), 2);

        // Slot 2 is dead: broadcasts no longer reach c
        let data = Packet::Data(DataPacket::new(0, 0, Bytes::from_static(b"x"))).encode();
        let out = relay.handle_datagram(a, &data);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, b);

        // The same address HELLOs again and gets a fresh, unused id
        assert_eq!(join_relay(&mut relay, c), 3);
        assert_eq!(relay.session_count(), 4);
    }

    #[test]
    fn test_bye_trusts_claimed_id() {
        let mut relay = RelayServer::new();
        let (a, b) = (addr(4000), addr(4001));
        join_relay(&mut relay, a);
        join_relay(&mut relay, b);

        // b claims a's id; slot 0 dies even though b sent it
        relay.handle_datagram(b, &Packet::Bye { sender_id: 0 }.encode());
        let data = Packet::Data(DataPacket::new(1, 0, Bytes::from_static(b"x"))).encode();
        let out = relay.handle_datagram(b, &data);
        assert!(out.is_empty());
    }

    #[test]
    fn test_bye_for_unknown_id_is_ignored() {
        let mut relay = RelayServer::new();
        let (a, b) = (addr(5000), addr(5001));
        join_relay(&mut relay, a);
        join_relay(&mut relay, b);

        let out = relay.handle_datagram(a, &Packet::Bye { sender_id: 200 }.encode());
        // Broadcast still happens, table untouched
        assert_eq!(out.len(), 1);
        let data = Packet::Data(DataPacket::new(0, 0, Bytes::from_static(b"x"))).encode();
        assert_eq!(relay.handle_datagram(b, &data).len(), 1);
    }

    #[test]
    fn test_unknown_and_unexpected_packets_dropped() {
        let mut relay = RelayServer::new();
        join_relay(&mut relay, addr(6000));

        assert!(relay.handle_datagram(addr(6001), &[42, 0, 0]).is_empty());
        assert!(relay
            .handle_datagram(addr(6001), &Packet::Welcome { sender_id: 0 }.encode())
            .is_empty());
        assert!(relay.handle_datagram(addr(6001), &[]).is_empty());
    }
}
