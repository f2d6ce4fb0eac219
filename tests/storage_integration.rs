//! End-to-end duplicate-suppression scenario from `SPEC_FULL.md` §8: calling
//! `process_knowledge` twice on the same paper with `pdf_url` set issues
//! exactly one HTTP GET, since the second call finds the raw file already
//! present and skips the download.

use quantmind::config::LocalStorageConfig;
use quantmind::models::{Content, KnowledgeItem, Paper};
use quantmind::storage::Storage;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A minimal single-threaded HTTP/1.1 server that always replies with a
/// fixed PDF body, counting how many connections it has accepted.
struct CountingPdfServer {
    addr: String,
    requests: Arc<AtomicUsize>,
}

impl CountingPdfServer {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0_u8; 1024];
                let _ = stream.read(&mut buf);
                let body = b"%PDF-1.4 fake";
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.write_all(body);
                let _ = stream.flush();
            }
        });

        Self { addr, requests }
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[test]
fn test_process_knowledge_downloads_pdf_once_and_skips_on_repeat() {
    let server = CountingPdfServer::start();
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(&LocalStorageConfig {
        storage_dir: dir.path().to_path_buf(),
        download_timeout: 5,
    })
    .unwrap();

    let paper = Paper {
        arxiv_id: Some("dup-test".to_string()),
        pdf_url: Some(format!("http://{}/paper.pdf", server.addr)),
        base: KnowledgeItem {
            title: "Duplicate Suppression".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    storage.process_knowledge(Content::Paper(paper.clone())).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(server.request_count(), 1);

    storage.process_knowledge(Content::Paper(paper)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(server.request_count(), 1, "second process_knowledge call must not re-download");

    assert!(storage.get_raw_file("dup-test").is_some());
}
