use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tempfile::tempdir;

use imgsweep::net::{FsSaver, HttpNet};
use imgsweep::{ChannelSink, Engine, EngineConfig, Event, QualifiedImage, SaveRequest};

type Hits = Arc<Mutex<HashMap<String, usize>>>;

async fn spawn_test_server() -> (String, Hits) {
    let hits: Hits = Arc::new(Mutex::new(HashMap::new()));
    let hits_svc = hits.clone();
    let make_svc = make_service_fn(move |_conn| {
        let hits = hits_svc.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let hits = hits.clone();
                async move {
                    let path = req.uri().path().to_string();
                    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
                    match path.as_str() {
                        "/a.png" => Ok::<_, Infallible>(Response::new(Body::from(vec![b'a'; 256]))),
                        "/c.png" => Ok(Response::new(Body::from(vec![b'c'; 512]))),
                        "/slow.png" => {
                            // longer than any timeout used in these tests
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            Ok(Response::new(Body::from(vec![b's'; 64])))
                        }
                        _ => {
                            let mut res = Response::new(Body::from("not found"));
                            *res.status_mut() = StatusCode::NOT_FOUND;
                            Ok(res)
                        }
                    }
                }
            }))
        }
    });

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    listener.set_nonblocking(true).expect("nonblocking");
    let server = Server::from_tcp(listener).expect("from_tcp").serve(make_svc);
    tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("test server error: {}", e);
        }
    });
    (format!("http://{}", addr), hits)
}

fn job(base: &str, path: &str, name: &str) -> QualifiedImage {
    QualifiedImage {
        src: format!("{base}{path}"),
        page: base.to_string(),
        width: None,
        height: None,
        r#type: "image/png".to_string(),
        size: 0,
        disposition: String::new(),
        filename: Some(name.to_string()),
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        settle: Duration::from_millis(10),
        grace: Duration::ZERO,
        record_history: false,
    }
}

fn engine_with(
    base_timeout: Duration,
    dir: &std::path::Path,
) -> (Engine, tokio::sync::mpsc::UnboundedReceiver<Event>) {
    let net = Arc::new(HttpNet::new("imgsweep-test", base_timeout));
    let (sink, rx) = ChannelSink::channel();
    let engine = Engine::new(net, Arc::new(FsSaver::new(dir)), Arc::new(sink), test_config());
    (engine, rx)
}

async fn wait_for_close(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("engine should signal close")
            .expect("channel open");
        let done = matches!(event, Event::Close { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

#[tokio::test]
async fn zip_archive_contains_only_successful_jobs() {
    let (base, _) = spawn_test_server().await;
    let dir = tempdir().unwrap();
    let (engine, mut rx) = engine_with(Duration::from_millis(300), dir.path());

    let images = vec![
        job(&base, "/a.png", "a.png"),
        job(&base, "/slow.png", "b.png"),
        job(&base, "/c.png", "c.png"),
    ];
    engine.save(
        1,
        SaveRequest {
            images,
            zip: true,
            filename: "gallery.zip".to_string(),
            save_as: false,
        },
    );
    wait_for_close(&mut rx).await;

    let bytes = std::fs::read(dir.path().join("gallery.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.png", "c.png"]);

    let mut content = Vec::new();
    archive.by_name("a.png").unwrap().read_to_end(&mut content).unwrap();
    assert_eq!(content, vec![b'a'; 256]);
}

#[tokio::test]
async fn individual_mode_saves_under_the_template_directory() {
    let (base, _) = spawn_test_server().await;
    let dir = tempdir().unwrap();
    let (engine, mut rx) = engine_with(Duration::from_secs(2), dir.path());

    let images = vec![job(&base, "/a.png", "a.png"), job(&base, "/c.png", "c.png")];
    engine.save(
        1,
        SaveRequest {
            images,
            zip: false,
            filename: "pics/gallery.zip".to_string(),
            save_as: false,
        },
    );
    let events = wait_for_close(&mut rx).await;

    assert_eq!(
        std::fs::read(dir.path().join("pics/a.png")).unwrap(),
        vec![b'a'; 256]
    );
    assert_eq!(
        std::fs::read(dir.path().join("pics/c.png")).unwrap(),
        vec![b'c'; 512]
    );
    // the queue drains through progress reports down to zero
    let last_progress = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { remaining } => Some(*remaining),
            _ => None,
        })
        .last();
    assert_eq!(last_progress, Some(0));
}

#[tokio::test]
async fn terminate_discards_the_inflight_batch() {
    let (base, hits) = spawn_test_server().await;
    let dir = tempdir().unwrap();
    let (engine, mut rx) = engine_with(Duration::from_millis(500), dir.path());

    engine.save(
        7,
        SaveRequest {
            images: vec![job(&base, "/slow.png", "s.png"), job(&base, "/a.png", "a.png")],
            zip: true,
            filename: "cancelled.zip".to_string(),
            save_as: false,
        },
    );
    // let the first batch get in flight, then cancel
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.terminate(7);
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(!engine.is_active(7));
    assert!(!dir.path().join("cancelled.zip").exists());
    // the fetch had started before cancellation landed
    assert_eq!(hits.lock().unwrap().get("/a.png"), Some(&1));

    let mut saw_cancel_notice = false;
    let mut saw_badge_reset = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::Notice { message } if message.contains("canceled") => saw_cancel_notice = true,
            Event::Badge { text, .. } if text.is_empty() => saw_badge_reset = true,
            Event::Close { .. } => panic!("terminated session must not signal close"),
            _ => {}
        }
    }
    assert!(saw_cancel_notice);
    assert!(saw_badge_reset);
}

#[tokio::test]
async fn second_save_for_a_tab_replaces_the_first_session() {
    let (base, _) = spawn_test_server().await;
    let dir = tempdir().unwrap();
    let (engine, mut rx) = engine_with(Duration::from_millis(500), dir.path());

    engine.save(
        3,
        SaveRequest {
            images: vec![job(&base, "/slow.png", "s.png")],
            zip: true,
            filename: "first.zip".to_string(),
            save_as: false,
        },
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.save(
        3,
        SaveRequest {
            images: vec![job(&base, "/a.png", "a.png")],
            zip: true,
            filename: "second.zip".to_string(),
            save_as: false,
        },
    );
    let events = wait_for_close(&mut rx).await;

    // the replacement session completed; the replaced one emitted nothing
    assert!(dir.path().join("second.zip").exists());
    assert!(!dir.path().join("first.zip").exists());
    let closes = events.iter().filter(|e| matches!(e, Event::Close { .. })).count();
    assert_eq!(closes, 1);
    assert!(events.iter().any(
        |e| matches!(e, Event::Notice { message } if message.contains("canceled"))
    ));
}
