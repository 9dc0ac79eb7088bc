mod common;

use color_eyre::Result;
use common::*;
use pretty_assertions::assert_eq;
use serial_adapter::{
    queue::SendInfo,
    transport::{encode_payload, TransportError},
    Config, DrainPolicy,
};

fn resuming() -> Config {
    Config {
        drain_policy: DrainPolicy::Resume,
        ..Default::default()
    }
}

#[tokio::test]
async fn writes_are_hex_encoded() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut sent) = callback::<SendInfo>();
    adapter.send(vec![0x00, 0x0f, 0xa0, 0xff], cb);

    let (payload, responder) = next_operation(&mut controller).await?.into_write();
    assert_eq!(payload, "000fa0ff");
    responder.succeed();

    assert_eq!(sent.called().await?, SendInfo { bytes_sent: 4 });

    Ok(())
}

#[tokio::test]
async fn writes_in_order_one_at_a_time() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (tx, mut done) = calls();
    for chunk in ["A", "B", "C"] {
        let tx = tx.clone();
        adapter.send(chunk.as_bytes().to_vec(), move |_| {
            let _ = tx.send(chunk);
        });
    }

    for chunk in ["A", "B", "C"] {
        let (payload, responder) = next_operation(&mut controller).await?.into_write();
        assert_eq!(payload, encode_payload(chunk.as_bytes()));

        // Nothing else is written while this one is in flight.
        no_operation(&mut controller).await?;

        responder.succeed();
        assert_eq!(done.next().await?, chunk);
    }

    done.none().await?;

    let stats = stats(&adapter).await?;
    assert_eq!(stats.bytes_sent, 3);

    Ok(())
}

#[tokio::test]
async fn overflow_drops_newest_sends() -> Result<()> {
    let (adapter, mut controller) = start_adapter_with_config(resuming());

    let (tx, mut done) = calls();
    for index in 0..150u8 {
        let tx = tx.clone();
        adapter.send(vec![index], move |_| {
            let _ = tx.send(index);
        });
    }

    connect(&adapter, &mut controller, 115_200).await?;

    for index in 0..100u8 {
        let (payload, responder) = next_operation(&mut controller).await?.into_write();
        assert_eq!(payload, encode_payload(&[index]));
        responder.succeed();

        assert_eq!(done.next().await?, index);
    }

    no_operation(&mut controller).await?;
    done.none().await?;

    Ok(())
}

#[tokio::test]
async fn nothing_is_written_while_disconnected() -> Result<()> {
    let (adapter, mut controller) = start_adapter();

    let (cb, mut sent) = callback::<SendInfo>();
    adapter.send(vec![1], cb);

    no_operation(&mut controller).await?;
    sent.not_called().await?;

    Ok(())
}

#[tokio::test]
async fn stalled_queue_stays_stalled_by_default() -> Result<()> {
    let (adapter, mut controller) = start_adapter();

    // Stalls: there is no connection.
    let (cb, mut first) = callback::<SendInfo>();
    adapter.send(vec![1], cb);

    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut second) = callback::<SendInfo>();
    adapter.send(vec![2], cb);

    no_operation(&mut controller).await?;
    first.not_called().await?;
    second.not_called().await?;

    // Emptying the buffer unsticks it.
    adapter.empty_output_buffer();

    let (cb, mut third) = callback::<SendInfo>();
    adapter.send(vec![3], cb);

    let (payload, responder) = next_operation(&mut controller).await?.into_write();
    assert_eq!(payload, "03");
    responder.succeed();
    third.called().await?;

    Ok(())
}

#[tokio::test]
async fn failed_write_stalls_by_default() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut first) = callback::<SendInfo>();
    adapter.send(vec![1], cb);
    next_operation(&mut controller)
        .await?
        .into_write()
        .1
        .fail(TransportError::rejected("write failed"));

    let (cb, mut second) = callback::<SendInfo>();
    adapter.send(vec![2], cb);

    no_operation(&mut controller).await?;
    first.not_called().await?;
    second.not_called().await?;

    assert_eq!(stats(&adapter).await?.consecutive_failures, 1);

    Ok(())
}

#[tokio::test]
async fn failed_write_is_retried_on_next_send_when_resuming() -> Result<()> {
    let (adapter, mut controller) = start_adapter_with_config(resuming());
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut first) = callback::<SendInfo>();
    adapter.send(vec![1], cb);
    next_operation(&mut controller)
        .await?
        .into_write()
        .1
        .fail(TransportError::rejected("write failed"));

    first.not_called().await?;

    let (cb, mut second) = callback::<SendInfo>();
    adapter.send(vec![2], cb);

    // The failed head is written again before anything else.
    let (payload, responder) = next_operation(&mut controller).await?.into_write();
    assert_eq!(payload, "01");
    responder.succeed();
    first.called().await?;

    let (payload, responder) = next_operation(&mut controller).await?.into_write();
    assert_eq!(payload, "02");
    responder.succeed();
    second.called().await?;

    assert_eq!(stats(&adapter).await?.consecutive_failures, 0);

    Ok(())
}

#[tokio::test]
async fn disconnect_drops_pending_sends() -> Result<()> {
    let (adapter, mut controller) = start_adapter();
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut in_flight) = callback::<SendInfo>();
    adapter.send(vec![1], cb);
    let (cb, mut queued) = callback::<SendInfo>();
    adapter.send(vec![2], cb);

    let (_, write) = next_operation(&mut controller).await?.into_write();

    let (cb, mut disconnected) = callback::<bool>();
    adapter.disconnect(cb);
    next_operation(&mut controller).await?.into_close().succeed();
    assert!(disconnected.called().await?);

    // Completes after the queue was emptied.
    write.succeed();

    in_flight.not_called().await?;
    queued.not_called().await?;
    no_operation(&mut controller).await?;

    // A fresh connection starts with an empty queue.
    connect(&adapter, &mut controller, 115_200).await?;

    let (cb, mut fresh) = callback::<SendInfo>();
    adapter.send(vec![3], cb);

    let (payload, responder) = next_operation(&mut controller).await?.into_write();
    assert_eq!(payload, "03");
    responder.succeed();
    fresh.called().await?;

    Ok(())
}
