use std::sync::Arc;

use anyhow::{anyhow, Result};
use rickdex_api::CharacterApi;
use rickdex_bus::BusPublisher;
use rickdex_schema::CharacterId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::loader::CharacterLoader;
use crate::resolver::EpisodeResolver;
use crate::state::{BrowserState, BrowserView, Command, Effect, Input};

const COMMAND_QUEUE: usize = 32;

/// Single owner of the browser state.
///
/// User commands arrive on a bounded queue, fetch completions on an internal
/// one. Every transition is published as a fresh `BrowserView` snapshot
/// before its bus events go out.
pub struct Controller {
    state: BrowserState,
    loader: CharacterLoader,
    resolver: EpisodeResolver,
    publisher: BusPublisher,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Input>,
    completions_rx: mpsc::UnboundedReceiver<Input>,
    view_tx: watch::Sender<BrowserView>,
}

impl Controller {
    pub fn new(
        api: Arc<dyn CharacterApi>,
        publisher: BusPublisher,
        start: CharacterId,
    ) -> (Self, ControllerHandle) {
        let state = BrowserState::new(start);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view());

        let controller = Self {
            state,
            loader: CharacterLoader::new(api.clone()),
            resolver: EpisodeResolver::new(api),
            publisher,
            commands: cmd_rx,
            completions_tx,
            completions_rx,
            view_tx,
        };
        let handle = ControllerHandle {
            commands: cmd_tx,
            view: view_rx,
        };
        (controller, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Load the start identifier, then process inputs until every handle is
    /// dropped.
    pub async fn run(mut self) {
        let effects = self.state.start();
        self.commit(effects).await;

        loop {
            let input = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Input::Command(cmd),
                    None => break,
                },
                Some(done) = self.completions_rx.recv() => done,
            };
            let effects = self.state.apply(input);
            self.commit(effects).await;
        }

        tracing::debug!("controller stopped");
    }

    async fn commit(&mut self, effects: Vec<Effect>) {
        self.view_tx.send_replace(self.state.view());

        for effect in effects {
            match effect {
                Effect::Load { ticket, id } => {
                    let loader = self.loader.clone();
                    let tx = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = loader.load(id).await;
                        let _ = tx.send(Input::CharacterFetched { ticket, id, result });
                    });
                }
                Effect::Resolve { ticket, refs } => {
                    let resolver = self.resolver.clone();
                    let tx = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = resolver.resolve(&refs).await;
                        let _ = tx.send(Input::EpisodesFetched { ticket, result });
                    });
                }
                Effect::Publish(msg) => {
                    if let Err(e) = self.publisher.publish(msg).await {
                        tracing::warn!(error = %e, "failed to publish bus message");
                    }
                }
            }
        }
    }
}

/// Cloneable front door to a running `Controller`.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<BrowserView>,
}

impl ControllerHandle {
    pub async fn send(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| anyhow!("controller stopped"))
    }

    /// Non-blocking variant for synchronous callers such as the TUI loop.
    pub fn dispatch(&self, cmd: Command) -> Result<()> {
        self.commands
            .try_send(cmd)
            .map_err(|e| anyhow!("controller unavailable: {e}"))
    }

    pub async fn search(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::Search(text.into())).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(Command::Previous).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.send(Command::Reload).await
    }

    pub fn view(&self) -> BrowserView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BrowserView> {
        self.view.clone()
    }

    /// Wait for the first snapshot matching `pred`, including the current one.
    pub async fn wait_for<F>(&self, pred: F) -> Result<BrowserView>
    where
        F: FnMut(&BrowserView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(pred)
            .await
            .map_err(|_| anyhow!("controller stopped"))?;
        Ok(view.clone())
    }
}
