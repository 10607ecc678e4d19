//! Integration tests for the in-memory transport.
//!
//! These wire several nodes onto one `MemoryNetwork` and check that frames,
//! joins and leaves show up in the right inboxes.

#[cfg(feature = "memory")]
mod memory {
    use courier_transport::{
        MemoryNetwork, NodeId, Transport, TransportError, TransportEvent,
    };

    fn node(id: u64) -> NodeId {
        NodeId::new(id)
    }

    #[tokio::test]
    async fn test_join_notifies_existing_and_new_nodes() {
        let net = MemoryNetwork::new();
        let (_a, mut a_rx) = net.join(node(1));
        let (_b, mut b_rx) = net.join(node(2));

        assert_eq!(
            a_rx.recv().await,
            Some(TransportEvent::NodeConnected(node(2)))
        );
        assert_eq!(
            b_rx.recv().await,
            Some(TransportEvent::NodeConnected(node(1)))
        );
        assert_eq!(net.nodes(), vec![node(1), node(2)]);
    }

    #[tokio::test]
    async fn test_send_to_delivers_with_transport_sender() {
        let net = MemoryNetwork::new();
        let (a, _a_rx) = net.join(node(1));
        let (_b, mut b_rx) = net.join(node(2));
        // Skip the join notification.
        b_rx.recv().await.unwrap();

        a.send_to(node(2), b"hello".to_vec()).expect("send should succeed");

        assert_eq!(
            b_rx.recv().await,
            Some(TransportEvent::Received {
                from: node(1),
                data: b"hello".to_vec(),
            })
        );
    }

    #[tokio::test]
    async fn test_send_to_preserves_order_between_two_nodes() {
        let net = MemoryNetwork::new();
        let (a, _a_rx) = net.join(node(1));
        let (_b, mut b_rx) = net.join(node(2));
        b_rx.recv().await.unwrap();

        for i in 0u8..10 {
            a.send_to(node(2), vec![i]).unwrap();
        }

        for i in 0u8..10 {
            match b_rx.recv().await {
                Some(TransportEvent::Received { data, .. }) => {
                    assert_eq!(data, vec![i]);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let net = MemoryNetwork::new();
        let (a, mut a_rx) = net.join(node(1));
        let (_b, mut b_rx) = net.join(node(2));
        let (_c, mut c_rx) = net.join(node(3));
        // Drain join notifications: a saw 2 and 3, b saw 1 and 3, c saw 1 and 2.
        for _ in 0..2 {
            a_rx.recv().await.unwrap();
            b_rx.recv().await.unwrap();
            c_rx.recv().await.unwrap();
        }

        a.broadcast(b"all".to_vec()).unwrap();

        for rx in [&mut b_rx, &mut c_rx] {
            assert_eq!(
                rx.recv().await,
                Some(TransportEvent::Received {
                    from: node(1),
                    data: b"all".to_vec(),
                })
            );
        }
        assert!(a_rx.try_recv().is_err(), "sender must not hear itself");
    }

    #[tokio::test]
    async fn test_send_to_unknown_node_returns_error() {
        let net = MemoryNetwork::new();
        let (a, _a_rx) = net.join(node(1));

        let result = a.send_to(node(99), vec![1]);

        assert!(matches!(result, Err(TransportError::UnknownNode(n)) if n == node(99)));
    }

    #[tokio::test]
    async fn test_disconnect_notifies_remaining_nodes() {
        let net = MemoryNetwork::new();
        let (_a, mut a_rx) = net.join(node(1));
        let (b, _b_rx) = net.join(node(2));
        a_rx.recv().await.unwrap();

        assert!(net.disconnect(node(2)));

        assert_eq!(
            a_rx.recv().await,
            Some(TransportEvent::NodeDisconnected(node(2)))
        );
        // A departed node can no longer send.
        assert!(matches!(
            b.send_to(node(1), vec![1]),
            Err(TransportError::Shutdown)
        ));
        assert!(!net.disconnect(node(2)), "second disconnect is a no-op");
    }
}
