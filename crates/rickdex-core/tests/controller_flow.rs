use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rickdex_api::{CharacterApi, HttpApi};
use rickdex_bus::{EventBus, Topic};
use rickdex_core::{Controller, ControllerHandle, LoadStatus};
use rickdex_schema::{BusMessage, Character, CharacterId, Episode, EpisodeSummary, Notice};
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(2);
const EPISODE_BASE: &str = "https://rickandmortyapi.com/api/episode";

fn character(id: i64, name: &str, episodes: &[i64]) -> Character {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "status": "Alive",
        "species": "Human",
        "gender": "Male",
        "origin": { "name": "Earth (C-137)" },
        "location": { "name": "Citadel of Ricks" },
        "image": format!("https://rickandmortyapi.com/api/character/avatar/{id}.jpeg"),
        "episode": episodes
            .iter()
            .map(|e| format!("{EPISODE_BASE}/{e}"))
            .collect::<Vec<_>>(),
        "created": "2017-11-04T18:48:46.250Z"
    }))
    .unwrap()
}

#[derive(Default)]
struct FakeApi {
    characters: HashMap<i64, Character>,
    episodes: HashMap<String, Episode>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    character_calls: AtomicUsize,
}

impl FakeApi {
    fn with_character(mut self, c: Character) -> Self {
        let id = c.id.map(CharacterId::get).unwrap_or_default();
        self.characters.insert(id, c);
        self
    }

    fn with_episode(mut self, id: i64, name: &str) -> Self {
        self.episodes.insert(
            format!("{EPISODE_BASE}/{id}"),
            Episode {
                id,
                name: name.into(),
                air_date: None,
                code: None,
            },
        );
        self
    }

    /// Hold the episode request until the returned gate is notified.
    fn gate(&self, episode: i64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(format!("{EPISODE_BASE}/{episode}"), gate.clone());
        gate
    }
}

#[async_trait]
impl CharacterApi for FakeApi {
    async fn character(&self, id: CharacterId) -> Result<Character> {
        self.character_calls.fetch_add(1, Ordering::SeqCst);
        self.characters
            .get(&id.get())
            .cloned()
            .ok_or_else(|| anyhow!("api error (404 Not Found)"))
    }

    async fn episode(&self, url: &str) -> Result<Episode> {
        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.episodes
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("api error (500 Internal Server Error)"))
    }
}

async fn start(api: Arc<FakeApi>, bus: &EventBus, id: i64) -> ControllerHandle {
    let (controller, handle) = Controller::new(api, bus.publisher(), CharacterId::new(id));
    controller.spawn();
    handle
}

async fn settled_at(handle: &ControllerHandle, id: i64) -> rickdex_core::BrowserView {
    timeout(
        WAIT,
        handle.wait_for(|v| v.identifier == CharacterId::new(id) && v.is_settled()),
    )
    .await
    .expect("controller settled in time")
    .unwrap()
}

async fn drain_notices(rx: &mut mpsc::Receiver<BusMessage>) -> Vec<Notice> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut notices = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let BusMessage::NoticeRaised { notice, .. } = msg {
            notices.push(notice);
        }
    }
    notices
}

#[tokio::test]
async fn startup_loads_character_and_episodes() {
    let api = Arc::new(
        FakeApi::default()
            .with_character(character(1, "Rick Sanchez", &[1, 2]))
            .with_episode(1, "Pilot")
            .with_episode(2, "Lawnmower Dog"),
    );
    let bus = EventBus::new(16);
    let handle = start(api, &bus, 1).await;

    let view = settled_at(&handle, 1).await;

    assert_eq!(view.character.unwrap().name, "Rick Sanchez");
    assert_eq!(
        view.episodes,
        vec![
            EpisodeSummary {
                number: 1,
                name: "Pilot".into()
            },
            EpisodeSummary {
                number: 2,
                name: "Lawnmower Dog".into()
            },
        ]
    );
    assert_eq!(view.search_text, "1");
    assert!(!view.error);
}

#[tokio::test]
async fn missing_character_clears_state_and_notifies_once() {
    let api = Arc::new(
        FakeApi::default()
            .with_character(character(1, "Rick Sanchez", &[1]))
            .with_episode(1, "Pilot"),
    );
    let bus = EventBus::new(16);
    let mut notices_rx = bus.subscribe(Topic::NoticeRaised).await;
    let handle = start(api, &bus, 1).await;
    settled_at(&handle, 1).await;

    handle.search("99999").await.unwrap();
    let view = settled_at(&handle, 99999).await;

    assert!(view.character.is_none());
    assert!(view.episodes.is_empty());
    assert!(view.error);
    assert_eq!(view.character_status, LoadStatus::Failed);
    assert_eq!(
        drain_notices(&mut notices_rx).await,
        vec![Notice::CharacterNotFound {
            id: CharacterId::new(99999)
        }]
    );
}

#[tokio::test]
async fn invalid_search_never_reaches_loader() {
    let api = Arc::new(FakeApi::default().with_character(character(5, "Goldenfold", &[])));
    let bus = EventBus::new(16);
    let mut notices_rx = bus.subscribe(Topic::NoticeRaised).await;
    let handle = start(api.clone(), &bus, 5).await;
    settled_at(&handle, 5).await;
    let calls_before = api.character_calls.load(Ordering::SeqCst);

    handle.search("abc").await.unwrap();
    let view = timeout(WAIT, handle.wait_for(|v| v.search_text == "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(view.identifier, CharacterId::new(5));
    assert_eq!(
        drain_notices(&mut notices_rx).await,
        vec![Notice::InvalidIdentifier {
            input: "abc".into()
        }]
    );
    assert_eq!(api.character_calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn previous_then_next_returns_to_start_with_fresh_loads() {
    let api = Arc::new(
        FakeApi::default()
            .with_character(character(4, "Beth Smith", &[]))
            .with_character(character(5, "Jerry Smith", &[])),
    );
    let bus = EventBus::new(16);
    let handle = start(api.clone(), &bus, 5).await;
    settled_at(&handle, 5).await;

    handle.previous().await.unwrap();
    let view = settled_at(&handle, 4).await;
    assert_eq!(view.character.unwrap().name, "Beth Smith");

    handle.next().await.unwrap();
    let view = settled_at(&handle, 5).await;
    assert_eq!(view.character.unwrap().name, "Jerry Smith");
    assert_eq!(api.character_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn late_episodes_for_previous_character_are_discarded() {
    let api = FakeApi::default()
        .with_character(character(1, "Rick Sanchez", &[1]))
        .with_character(character(2, "Morty Smith", &[2]))
        .with_episode(1, "Pilot")
        .with_episode(2, "Lawnmower Dog");
    let rick_gate = api.gate(1);
    let api = Arc::new(api);
    let bus = EventBus::new(16);
    let handle = start(api, &bus, 1).await;

    // Rick is on screen, his episode list is still in flight.
    timeout(
        WAIT,
        handle.wait_for(|v| {
            v.character_status == LoadStatus::Loaded && v.episode_status == LoadStatus::Loading
        }),
    )
    .await
    .unwrap()
    .unwrap();

    handle.next().await.unwrap();
    let view = settled_at(&handle, 2).await;
    assert_eq!(view.episodes[0].name, "Lawnmower Dog");

    rick_gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let view = handle.view();
    assert_eq!(view.character.unwrap().name, "Morty Smith");
    assert_eq!(
        view.episodes,
        vec![EpisodeSummary {
            number: 2,
            name: "Lawnmower Dog".into()
        }]
    );
}

#[tokio::test]
async fn one_missing_episode_leaves_list_empty_without_notice() {
    let api = Arc::new(
        FakeApi::default()
            .with_character(character(1, "Rick Sanchez", &[1, 2, 3]))
            .with_episode(1, "Pilot")
            .with_episode(3, "Anatomy Park"),
    );
    let bus = EventBus::new(16);
    let mut notices_rx = bus.subscribe(Topic::NoticeRaised).await;
    let mut failures_rx = bus.subscribe(Topic::EpisodesFailed).await;
    let handle = start(api, &bus, 1).await;

    let view = settled_at(&handle, 1).await;

    assert!(view.character.is_some());
    assert!(view.episodes.is_empty());
    assert_eq!(view.episode_status, LoadStatus::Failed);
    assert!(drain_notices(&mut notices_rx).await.is_empty());
    assert!(matches!(
        failures_rx.try_recv(),
        Ok(BusMessage::EpisodesFailed { .. })
    ));
}

#[tokio::test]
async fn end_to_end_against_mock_http_server() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/character/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 2,
            "name": "Morty Smith",
            "status": "Alive",
            "species": "Human",
            "type": "",
            "gender": "Male",
            "origin": { "name": "unknown", "url": "" },
            "location": { "name": "Citadel of Ricks", "url": "" },
            "image": format!("{base}/character/avatar/2.jpeg"),
            "episode": [format!("{base}/episode/1"), format!("{base}/episode/2")],
            "url": format!("{base}/character/2"),
            "created": "2017-11-04T18:50:21.651Z"
        })))
        .mount(&server)
        .await;
    for (id, name) in [(1, "Pilot"), (2, "Lawnmower Dog")] {
        Mock::given(method("GET"))
            .and(path(format!("/episode/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": id, "name": name })),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/character/3"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "Character not found" })),
        )
        .mount(&server)
        .await;

    let bus = EventBus::new(16);
    let (controller, handle) = Controller::new(
        Arc::new(HttpApi::new(base.clone())),
        bus.publisher(),
        CharacterId::new(2),
    );
    controller.spawn();

    let view = settled_at(&handle, 2).await;
    assert_eq!(view.character.as_ref().unwrap().location.name, "Citadel of Ricks");
    let numbers: Vec<i64> = view.episodes.iter().map(|e| e.number).collect();
    assert_eq!(numbers, vec![1, 2]);

    handle.next().await.unwrap();
    let view = settled_at(&handle, 3).await;
    assert!(view.character.is_none());
    assert!(view.episodes.is_empty());
    assert_eq!(view.search_text, "3");
}
