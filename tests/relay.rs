//! End-to-end relay scenario over loopback UDP
//!
//! Two clients against a live relay task: handshake, join announcement,
//! one relayed DATA frame, and departure.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use voice_relay::network::{bind_udp, RelayServer};
use voice_relay::protocol::{DataPacket, Packet};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn recv_packet(socket: &UdpSocket) -> Packet {
    let mut buf = [0u8; 8300];
    let n = timeout(RECV_TIMEOUT, socket.recv(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .expect("receive failed");
    Packet::decode(&buf[..n]).expect("malformed datagram")
}

async fn recv_raw(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 8300];
    let n = timeout(RECV_TIMEOUT, socket.recv(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .expect("receive failed");
    buf[..n].to_vec()
}

async fn client_socket(server: std::net::SocketAddr) -> UdpSocket {
    let socket = bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
    socket.connect(server).await.unwrap();
    socket
}

#[tokio::test]
async fn two_clients_handshake_and_relay() {
    let server_socket = bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
    let server_addr = server_socket.local_addr().unwrap();
    tokio::spawn(RelayServer::new().run(server_socket));

    // First client joins and is assigned id 0
    let alice = client_socket(server_addr).await;
    alice.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&alice).await, Packet::Welcome { sender_id: 0 });

    // Second client joins: id 1, and the first client hears about it
    let bob = client_socket(server_addr).await;
    bob.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&bob).await, Packet::Welcome { sender_id: 1 });
    assert_eq!(recv_packet(&alice).await, Packet::Join { sender_id: 1 });

    // Client 0 sends a DATA frame; only client 1 receives it, verbatim
    let data = Packet::Data(DataPacket::new(
        0,
        0,
        Bytes::from_static(b"first voice frame"),
    ))
    .encode();
    alice.send(&data).await.unwrap();
    assert_eq!(recv_raw(&bob).await, data.to_vec());

    // Nothing was echoed back to the sender
    let mut buf = [0u8; 64];
    assert!(
        timeout(Duration::from_millis(200), alice.recv(&mut buf))
            .await
            .is_err(),
        "sender must not receive its own broadcast"
    );
}

#[tokio::test]
async fn bye_removes_peer_from_fanout() {
    let server_socket = bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
    let server_addr = server_socket.local_addr().unwrap();
    tokio::spawn(RelayServer::new().run(server_socket));

    let alice = client_socket(server_addr).await;
    alice.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&alice).await, Packet::Welcome { sender_id: 0 });

    let bob = client_socket(server_addr).await;
    bob.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&bob).await, Packet::Welcome { sender_id: 1 });
    assert_eq!(recv_packet(&alice).await, Packet::Join { sender_id: 1 });

    let carol = client_socket(server_addr).await;
    carol.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&carol).await, Packet::Welcome { sender_id: 2 });
    assert_eq!(recv_packet(&alice).await, Packet::Join { sender_id: 2 });
    assert_eq!(recv_packet(&bob).await, Packet::Join { sender_id: 2 });

    // Bob departs; the BYE reaches the other two
    bob.send(&Packet::Bye { sender_id: 1 }.encode())
        .await
        .unwrap();
    assert_eq!(recv_packet(&alice).await, Packet::Bye { sender_id: 1 });
    assert_eq!(recv_packet(&carol).await, Packet::Bye { sender_id: 1 });

    // A later broadcast skips the dead slot
    let data = Packet::Data(DataPacket::new(0, 7, Bytes::from_static(b"to carol only"))).encode();
    alice.send(&data).await.unwrap();
    assert_eq!(recv_raw(&carol).await, data.to_vec());

    let mut buf = [0u8; 64];
    assert!(
        timeout(Duration::from_millis(200), bob.recv(&mut buf))
            .await
            .is_err(),
        "departed peer must not receive broadcasts"
    );

    // The same address can come back as a brand new session
    bob.send(&Packet::Hello.encode()).await.unwrap();
    assert_eq!(recv_packet(&bob).await, Packet::Welcome { sender_id: 3 });
}
