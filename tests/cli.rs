//! Exit status of the `socks-tunnel` binary.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::Command;
use std::thread;

#[test]
fn tunnel_test_failure_exits_nonzero() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let proxy = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut greeting = [0u8; 3];
        socket.read_exact(&mut greeting).unwrap();
        // No acceptable method
        socket.write_all(&[0x05, 0xff]).unwrap();
    });

    let config_path = std::env::temp_dir().join(format!("socks-tunnel-{}.json", port));
    std::fs::write(
        &config_path,
        format!(
            r#"{{"token": "jwt", "proxy": {{"host": "127.0.0.1", "port": {}}}}}"#,
            port
        ),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_socks-tunnel"))
        .arg("--test")
        .arg(&config_path)
        .arg("db.remote:5432")
        .output()
        .unwrap();
    proxy.join().unwrap();
    std::fs::remove_file(&config_path).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported authentication method"));
}
