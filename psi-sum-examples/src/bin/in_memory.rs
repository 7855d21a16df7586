//! In-memory example of PSI-Sum protocol execution.
//!
//! This example runs the three PSI-Sum rounds within a single process,
//! handing each message directly from one party to the other without
//! network I/O.
//!
//! Run with:
//! ```bash
//! cargo run --bin in_memory
//! ```

use num_bigint_dig::BigUint;
use psi_sum_protocol::{
    GroupParameters, ProtocolConfig, ProtocolCoordinator, ReceiverParty, SenderParty,
};
use rand::{Rng, RngCore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== PSI-Sum Protocol In-Memory Example ===\n");

    // Receiver's identifiers
    let receiver_ids: Vec<Vec<u8>> = vec![
        b"u1".to_vec(),
        b"u2".to_vec(),
        b"u3".to_vec(),
        b"u4".to_vec(),
    ];

    // Sender's (identifier, value) records
    let sender_records: Vec<(Vec<u8>, u64)> = vec![
        (b"u1".to_vec(), 10),
        (b"u2".to_vec(), 20),
        (b"u3".to_vec(), 30),
        (b"u5".to_vec(), 40),
    ];

    println!("Receiver's identifiers ({}):", receiver_ids.len());
    for (i, id) in receiver_ids.iter().enumerate() {
        println!("  {}: {}", i + 1, String::from_utf8_lossy(id));
    }

    println!("\nSender's records ({}):", sender_records.len());
    for (i, (id, value)) in sender_records.iter().enumerate() {
        println!("  {}: {} = {}", i + 1, String::from_utf8_lossy(id), value);
    }

    let config = ProtocolConfig::default();

    // === Setup: shared group, per-party secrets ===
    println!("\n--- Setup ---");
    let params = GroupParameters::generate(config.group_bits)?;
    println!("Group modulus: {} bits, generator g = {}", params.bits(), params.g());

    let mut receiver = ReceiverParty::new(receiver_ids)?;
    let mut sender = SenderParty::new(sender_records, config.paillier_prime_bits)?;
    receiver.setup(&params)?;
    sender.setup(&params)?;
    println!(
        "Sender generated a {}-bit Paillier modulus",
        sender.public_key()?.n().bits()
    );

    // === Round 1: receiver -> sender ===
    // In a real deployment these messages travel over an authenticated channel.
    println!("\n--- Round 1: Receiver -> Sender ---");
    let round1 = receiver.round1()?;
    println!("Receiver sent {} (identifier, H(id)^k_A) pairs", round1.len());

    // === Round 2: sender -> receiver ===
    println!("\n--- Round 2: Sender -> Receiver ---");
    let round2 = sender.round2(round1)?;
    println!(
        "Sender sent {} (H(w)^k_B, Enc(value)) pairs",
        round2.encrypted_pairs.len()
    );
    println!(
        "Sender sent {} double-blinded receiver elements",
        round2.double_blinded.len()
    );

    // === Round 3: receiver computes intersection ===
    println!("\n--- Round 3: Receiver Computes Intersection ---");
    let public_key = sender.public_key()?.clone();
    let result = receiver.round3(round2, &public_key)?;
    println!("Intersection size: {}", result.size);

    // === Sender decrypts the aggregate ===
    println!("\n--- Decrypt Aggregate ---");
    let sum = sender.decrypt_sum(result.sum_ciphertext.as_ref())?;
    println!("Intersection sum: {}", sum);

    assert_eq!(result.size, 3, "Unexpected intersection size");
    assert_eq!(sum, BigUint::from(60u32), "Unexpected intersection sum");

    println!("\n✓ Protocol completed successfully!");
    println!("✓ Receiver learned the intersection size, not the sender's values");
    println!("✓ Sender learned the intersection sum, not which records matched");
    println!("  (round 1 still reveals the receiver's identifiers to the sender)");

    // === Additional example: Large random sets ===
    println!("\n\n=== Large Random Sets Example ===\n");

    let mut rng = rand::rngs::OsRng;
    let mut receiver_large = Vec::new();
    let mut sender_large = Vec::new();
    let mut expected_sum = 0u64;

    // Generate 100 random items each, plus 10 common items
    println!("Generating random datasets...");

    for _ in 0..100 {
        let mut receiver_bytes = [0u8; 32];
        rng.fill_bytes(&mut receiver_bytes);
        receiver_large.push(receiver_bytes.to_vec());

        let mut sender_bytes = [0u8; 32];
        rng.fill_bytes(&mut sender_bytes);
        sender_large.push((sender_bytes.to_vec(), rng.gen_range(0..10_000u64)));
    }

    for _ in 0..10 {
        let mut common = [0u8; 32];
        rng.fill_bytes(&mut common);
        let value = rng.gen_range(0..10_000u64);
        expected_sum += value;
        receiver_large.push(common.to_vec());
        sender_large.push((common.to_vec(), value));
    }

    println!(
        "Receiver: {} identifiers, Sender: {} records",
        receiver_large.len(),
        sender_large.len()
    );

    let coordinator = ProtocolCoordinator::new(config)?;
    let output = coordinator.run_datasets(receiver_large, sender_large)?;

    println!(
        "\nIntersection size: {} (expected: 10)",
        output.intersection_size
    );
    println!(
        "Intersection sum: {} (expected: {})",
        output.intersection_sum, expected_sum
    );
    println!(
        "✓ Verification: {}",
        if output.intersection_size == 10 && output.intersection_sum == BigUint::from(expected_sum)
        {
            "PASSED"
        } else {
            "FAILED"
        }
    );

    Ok(())
}
