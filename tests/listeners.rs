mod common;

use color_eyre::Result;
use common::*;
use pretty_assertions::assert_eq;
use serial_adapter::transport::TransportError;

#[tokio::test]
async fn newest_listener_is_called_first() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (tx, mut called) = calls();
    for name in ["L1", "L2"] {
        let tx = tx.clone();
        adapter.on_receive().add_listener(move |_| {
            let _ = tx.send(name);
        });
    }

    assert!(controller.inject_data(&b"hello"[..]));

    assert_eq!(called.next().await?, "L2");
    assert_eq!(called.next().await?, "L1");
    called.none().await?;

    Ok(())
}

#[tokio::test]
async fn listeners_added_before_connecting_receive() -> Result<()> {
    let (adapter, mut controller) = start_adapter();

    let (tx, mut received) = calls();
    adapter.on_receive().add_listener(move |received| {
        let _ = tx.send((received.connection_id, received.data.clone()));
    });

    let info = connect(&adapter, &mut controller, 115_200).await?;
    assert!(controller.inject_data(&b"abc"[..]));

    let (connection_id, data) = received.next().await?;
    assert_eq!(connection_id, info.connection_id);
    assert_eq!(&data[..], b"abc");

    Ok(())
}

#[tokio::test]
async fn empty_reads_are_not_dispatched() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (tx, mut lengths) = calls();
    adapter.on_receive().add_listener(move |received| {
        let _ = tx.send(received.data.len());
    });

    assert!(controller.inject_data(Vec::new()));
    assert!(controller.inject_data(vec![1, 2]));

    // The empty read was skipped.
    assert_eq!(lengths.next().await?, 2);
    lengths.none().await?;

    Ok(())
}

#[tokio::test]
async fn read_errors_are_dispatched() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (data_tx, mut data) = calls();
    adapter.on_receive().add_listener(move |_| {
        let _ = data_tx.send(());
    });

    let (error_tx, mut errors) = calls();
    for name in ["first", "second"] {
        let error_tx = error_tx.clone();
        adapter.on_receive_error().add_listener(move |received| {
            let _ = error_tx.send((name, received.error.to_string()));
        });
    }

    assert!(controller.inject_error(TransportError::rejected("framing")));

    let (name, error) = errors.next().await?;
    assert_eq!(name, "second");
    assert!(error.contains("framing"), "{error}");
    assert_eq!(errors.next().await?.0, "first");

    data.none().await?;

    Ok(())
}

#[tokio::test]
async fn removed_listener_is_not_called() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (tx, mut called) = calls();

    let removed = {
        let tx = tx.clone();
        adapter.on_receive().add_listener(move |_| {
            let _ = tx.send("removed");
        })
    };
    adapter.on_receive().add_listener(move |_| {
        let _ = tx.send("kept");
    });

    assert!(adapter.on_receive().remove_listener(removed));

    assert!(controller.inject_data(&b"x"[..]));
    assert_eq!(called.next().await?, "kept");
    called.none().await?;

    Ok(())
}

#[tokio::test]
async fn disconnect_removes_every_listener() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    adapter.on_receive().add_listener(|_| {});
    adapter.on_receive().add_listener(|_| {});
    adapter.on_receive_error().add_listener(|_| {});

    assert!(disconnect(&adapter, &mut controller).await?);

    assert!(adapter.on_receive().is_empty());
    assert!(adapter.on_receive_error().is_empty());

    Ok(())
}

#[tokio::test]
async fn nothing_is_dispatched_after_disconnect() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut disconnected) = callback::<bool>();
    adapter.disconnect(cb);
    let close = next_operation(&mut controller).await?.into_close();

    // Listeners registered while the close is in flight.
    let (tx, mut called) = calls();
    adapter.on_receive().add_listener(move |_| {
        let _ = tx.send(());
    });

    // The inbox was detached before closing.
    controller.inject_data(&b"late"[..]);
    called.none().await?;

    close.succeed();
    assert!(disconnected.called().await?);

    Ok(())
}

#[tokio::test]
async fn refused_inbox_still_connects() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    controller.refuse_inbox(true);

    let (tx, mut called) = calls();
    adapter.on_receive().add_listener(move |_| {
        let _ = tx.send(());
    });

    let info = connect(&adapter, &mut controller, 115_200).await?;
    assert_eq!(info.bitrate, 115_200);
    assert_eq!(controller.inbox_registrations(), 0);

    assert!(!controller.inject_data(&b"x"[..]));
    called.none().await?;

    Ok(())
}

#[tokio::test]
async fn received_bytes_are_counted() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (tx, mut received) = calls();
    adapter.on_receive().add_listener(move |_| {
        let _ = tx.send(());
    });

    assert!(controller.inject_data(vec![0; 10]));
    assert!(controller.inject_data(vec![0; 5]));
    received.next().await?;
    received.next().await?;

    assert_eq!(stats(&adapter).await?.bytes_received, 15);

    Ok(())
}
