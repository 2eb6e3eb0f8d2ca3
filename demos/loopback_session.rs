// Several sessions sharing one simulated channel.
//
// The remote engine answers each request with its SHA-256 digest. Every
// client sends numbered messages and checks the digest it gets back.
//
//   cargo run --example loopback_session -- [messages-per-client] [--hold]
//
// With --hold the engine stops answering after the batch and the last
// session blocks until Ctrl-C interrupts it.

use fifo_link::Core::Loopback;
use fifo_link::{Client, DeviceBuilder, FifoError};
use sha2::{Digest, Sha256};
use std::env;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const CLIENTS: usize = 4;

fn pad_to_words(mut bytes: Vec<u8>) -> Vec<u8> {
    let padded = bytes.len().div_ceil(4) * 4;
    bytes.resize(padded, 0);
    bytes
}

fn read_response(client: &Client) -> fifo_link::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = client.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let messages: usize = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(100);
    let hold = args.iter().any(|a| a == "--hold");

    let engine = Loopback::with_responder(|request| Sha256::digest(request).to_vec());
    let device = DeviceBuilder::new()
        .with_reschedule_interval(Duration::from_millis(1))
        .with_response_timeout(Duration::from_secs(60 * 60))
        .attach(engine.clone())?;
    info!(device = device.name(), clients = CLIENTS, messages, "starting");

    let start = Instant::now();
    thread::scope(|s| -> fifo_link::Result<()> {
        let workers: Vec<_> = (0..CLIENTS)
            .map(|id| {
                let device = &device;
                s.spawn(move || -> fifo_link::Result<usize> {
                    let client = device.open()?;
                    for seq in 0..messages {
                        let request = pad_to_words(format!("client {id} message {seq}").into_bytes());
                        client.write(&request)?;
                        let digest = read_response(&client)?;
                        if digest[..] != Sha256::digest(&request)[..] {
                            return Err(FifoError::Protocol("digest mismatch"));
                        }
                    }
                    client.close()?;
                    Ok(messages)
                })
            })
            .collect();

        for worker in workers {
            let done = worker.join().map_err(|_| FifoError::Protocol("worker panicked"))??;
            info!(done, "client finished");
        }
        Ok(())
    })?;

    let total = CLIENTS * messages;
    println!(
        "{total} round trips in {:?}, {} EOTs raised, {} acked",
        start.elapsed(),
        engine.eot_raised(),
        engine.eot_acked()
    );

    if hold {
        engine.stall_responses(true);
        let client = device.open()?;
        let interrupter = client.interrupter();
        ctrlc::set_handler(move || interrupter.interrupt())?;

        client.write(&pad_to_words(b"are you there?".to_vec()))?;
        println!("Waiting for a response that never comes (Ctrl-C to stop)...");
        match read_response(&client) {
            Err(FifoError::Interrupted { .. }) => println!("Interrupted, closing session"),
            other => println!("Unexpected: {other:?}"),
        }
    }

    device.detach();
    Ok(())
}
