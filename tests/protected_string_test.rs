use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use securehash::{PipelineError, ProtectedString, ProtectedText};

#[test]
fn test_from_code_units_wipes_source() {
    let mut units: Vec<u16> = "s3cr3t".encode_utf16().collect();
    let secret = ProtectedString::from_code_units(&mut units).unwrap();

    assert!(units.iter().all(|&u| u == 0));
    assert_eq!(secret.len(), 6);

    secret
        .with_code_units(|view| {
            assert_eq!(String::from_utf16(view).unwrap(), "s3cr3t");
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_from_empty_code_units() {
    let mut units: [u16; 0] = [];
    let secret = ProtectedString::from_code_units(&mut units).unwrap();
    assert!(secret.is_empty());
}

#[test]
fn test_large_secret_spans_pages() {
    let text = "x".repeat(10_000);
    let secret = ProtectedString::from_text(&text).unwrap();

    assert_eq!(secret.len(), 10_000);
    secret
        .with_code_units(|view| {
            assert!(view.iter().all(|&u| u == u16::from(b'x')));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_access_after_close() {
    let secret = ProtectedString::from_text("closed").unwrap();
    let clone = secret.clone();
    secret.close();

    assert!(clone.is_closed());
    let result = clone.with_code_units(|_| Ok(()));
    assert!(matches!(result, Err(PipelineError::SecretClosed)));
}

#[test]
fn test_close_waits_for_reader() {
    let secret = ProtectedString::from_text("waiting").unwrap();
    let finished = Arc::new(AtomicBool::new(false));
    let (entered_tx, entered_rx) = mpsc::channel();

    let reader = {
        let secret = secret.clone();
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            secret
                .with_code_units(|view| {
                    entered_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                    assert_eq!(view.len(), 7);
                    finished.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        })
    };

    entered_rx.recv().unwrap();
    secret.close();

    // close() only returns once the reader has left
    assert!(finished.load(Ordering::SeqCst));
    reader.join().unwrap();
}

#[test]
fn test_panicking_reader_releases_view() {
    let secret = ProtectedString::from_text("unwind").unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: securehash::Result<()> = secret.with_code_units(|_| panic!("reader failed"));
    }));
    assert!(result.is_err());

    // The reader was deregistered, so the secret is still readable and close() does not hang
    let len = secret.with_code_units(|view| Ok(view.len())).unwrap();
    assert_eq!(len, 6);
    secret.close();
}

#[test]
fn test_concurrent_readers() {
    const THREADS: usize = 16;

    let secret = ProtectedString::from_text("shared secret").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let secret = secret.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    secret
                        .with_code_units(|view| {
                            assert_eq!(String::from_utf16(view).unwrap(), "shared secret");
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    secret.close();
}

#[test]
fn test_close_races_with_readers() {
    const THREADS: usize = 8;

    let secret = ProtectedString::from_text("racing").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let secret = secret.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match secret.with_code_units(|view| Ok(view.to_vec())) {
                        Ok(units) => assert_eq!(String::from_utf16(&units).unwrap(), "racing"),
                        Err(PipelineError::SecretClosed) => break,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(5));
    secret.close();

    for handle in handles {
        handle.join().unwrap();
    }
}
