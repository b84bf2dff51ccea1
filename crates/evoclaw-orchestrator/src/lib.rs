//! Fan-in from registered channels into a single inbox, and the dispatch
//! loop that wires Registry + Memory + Router together.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use evoclaw_channel::{shutdown_pair, Channel, Context, Message, Response};
use evoclaw_core::{AgentId, Error, Result};
use evoclaw_memory::{MemoryStore, Role};
use evoclaw_registry::AgentRegistry;
use evoclaw_router::{ChatRequest, Router};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const DEFAULT_INBOX_CAPACITY: usize = 256;

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    memory: Arc<MemoryStore>,
    router: Arc<Router>,
    channels: RwLock<HashMap<String, Arc<dyn Channel>>>,
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    history_window: usize,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>, memory: Arc<MemoryStore>, router: Arc<Router>, history_window: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        let (shutdown_tx, shutdown_rx) = shutdown_pair();
        Self {
            registry,
            memory,
            router,
            channels: RwLock::new(HashMap::new()),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
            history_window,
        }
    }

    pub fn register_channel(&self, channel: Arc<dyn Channel>) {
        self.channels.write().expect("orchestrator channels poisoned").insert(channel.name().to_string(), channel);
    }

    fn ctx(&self) -> Context {
        Context::new(self.shutdown_rx.clone())
    }

    /// Spawn one fan-in task per registered channel and the dispatch loop.
    /// Calling `start` twice is a programmer error (the inbox receiver can
    /// only be taken once).
    pub async fn start(&self) -> Result<()> {
        let channels: Vec<Arc<dyn Channel>> = self.channels.read().expect("orchestrator channels poisoned").values().cloned().collect();

        let mut tasks = self.tasks.lock().expect("orchestrator tasks poisoned");
        for channel in channels {
            channel.start(self.ctx()).await?;
            let inbox_tx = self.inbox_tx.clone();
            let name = channel.name().to_string();
            info!(channel = %name, "orchestrator fan-in task starting");
            tasks.push(tokio::spawn(async move {
                let mut stream = channel.receive();
                while let Some(mut message) = stream.next().await {
                    message.channel = name.clone();
                    if inbox_tx.send(message).await.is_err() {
                        break;
                    }
                }
            }));
        }

        let inbox_rx = self.inbox_rx.lock().expect("orchestrator inbox poisoned").take().expect("Orchestrator::start called more than once");
        let registry = self.registry.clone();
        let memory = self.memory.clone();
        let router = self.router.clone();
        let channels = self.channels_snapshot();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let history_window = self.history_window;
        tasks.push(tokio::spawn(async move {
            dispatch_loop(inbox_rx, registry, memory, router, channels, &mut shutdown_rx, history_window).await;
        }));

        Ok(())
    }

    fn channels_snapshot(&self) -> HashMap<String, Arc<dyn Channel>> {
        self.channels.read().expect("orchestrator channels poisoned").clone()
    }

    /// Cancel the dispatch loop's context, stop every channel, and join all
    /// spawned tasks before returning.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let channels: Vec<Arc<dyn Channel>> = self.channels.read().expect("orchestrator channels poisoned").values().cloned().collect();
        for channel in channels {
            channel.stop().await;
        }
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().expect("orchestrator tasks poisoned").drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn dispatch_loop(
    mut inbox_rx: mpsc::Receiver<Message>,
    registry: Arc<AgentRegistry>,
    memory: Arc<MemoryStore>,
    router: Arc<Router>,
    channels: HashMap<String, Arc<dyn Channel>>,
    shutdown_rx: &mut watch::Receiver<bool>,
    history_window: usize,
) {
    loop {
        tokio::select! {
            message = inbox_rx.recv() => {
                match message {
                    Some(message) => dispatch_one(&registry, &memory, &router, &channels, message, history_window).await,
                    None => break,
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn dispatch_one(
    registry: &AgentRegistry,
    memory: &MemoryStore,
    router: &Router,
    channels: &HashMap<String, Arc<dyn Channel>>,
    message: Message,
    history_window: usize,
) {
    let channel = match channels.get(&message.channel) {
        Some(c) => c.clone(),
        None => {
            warn!(channel = %message.channel, "no registered channel for inbound message, dropping");
            return;
        }
    };

    let agent = match registry.get_snapshot(&message.to) {
        Ok(agent) => agent,
        Err(e) => {
            reply_error(channel.as_ref(), &message, &message.to, &e).await;
            return;
        }
    };

    let history = memory.get_recent(agent.id.as_str(), history_window);
    let mut req = ChatRequest::new(history);
    req.messages.push(evoclaw_memory::ChatMessage::new(Role::User, message.content.clone()));

    let fallback = fallback_models(&agent.definition.config_map);
    let started = Instant::now();
    match router.chat(&agent.definition.model, req, &fallback).await {
        Ok(resp) => {
            memory.add(agent.id.as_str(), Role::User, message.content.clone());
            memory.add(agent.id.as_str(), Role::Assistant, resp.content.clone());
            memory.save(agent.id.as_str());

            let _ = registry.record_message(&agent.id);
            let _ = registry.update_metrics(&agent.id, resp.tokens_in + resp.tokens_out, 0.0, started.elapsed().as_millis() as f64, true);

            let out = Response::for_message(&message, agent.id.clone(), resp.content, agent.definition.model.clone());
            if let Err(e) = channel.send(Context::background(), out).await {
                error!(agent_id = %agent.id, error = %e, "failed to deliver response through channel");
            }
        }
        Err(e) => {
            let _ = registry.record_error(&agent.id);
            let _ = registry.update_metrics(&agent.id, 0, 0.0, started.elapsed().as_millis() as f64, false);
            reply_error(channel.as_ref(), &message, &agent.id, &e).await;
        }
    }
}

fn fallback_models(config_map: &HashMap<String, serde_json::Value>) -> Vec<String> {
    config_map
        .get("fallback_models")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

async fn reply_error(channel: &dyn Channel, message: &Message, agent_id: &AgentId, err: &Error) {
    let response = Response {
        message_id: message.id.clone(),
        agent_id: agent_id.clone(),
        channel: message.channel.clone(),
        content: err.message.clone(),
        model: String::new(),
        metadata: HashMap::new(),
    };
    if let Err(e) = channel.send(Context::background(), response).await {
        error!(error = %e, "failed to deliver error response through channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoclaw_registry::AgentDefinition;
    use evoclaw_router::mock::MockProvider;
    use std::time::Duration;

    fn def(model: &str) -> AgentDefinition {
        AgentDefinition {
            name: "bot".into(),
            agent_type: "chat".into(),
            model: model.into(),
            system_prompt: "be helpful".into(),
            skills: vec![],
            config_map: HashMap::new(),
            genome: None,
        }
    }

    #[tokio::test]
    async fn dispatches_message_and_routes_response_back_through_originating_channel() {
        let data_dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(AgentRegistry::new(data_dir.path().join("agents")));
        let memory = Arc::new(MemoryStore::new(data_dir.path().join("memory"), 100, 32_000));
        let router = Arc::new(Router::new());
        router.register_provider(Arc::new(MockProvider::succeeding("P", "m", "hi there", 3, 4)));

        let id = AgentId::from("a1");
        registry.create(id.clone(), def("P/m")).unwrap();

        let orchestrator = Orchestrator::new(registry.clone(), memory.clone(), router.clone(), 20);
        let http = Arc::new(evoclaw_channel::HttpChannel::new("http", 8));
        orchestrator.register_channel(http.clone());
        orchestrator.start().await.unwrap();

        let msg = Message::new("http", "tester", id.clone(), "hello");
        let message_id = msg.id.clone();
        let waiter = {
            let http = http.clone();
            tokio::spawn(async move { http.wait_for_response(Context::background(), message_id).await })
        };
        http.submit(Context::background(), msg).await.unwrap();

        let resp = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap().unwrap();
        assert_eq!(resp.content, "hi there");
        assert_eq!(resp.model, "P/m");

        orchestrator.shutdown().await;

        let snap = registry.get_snapshot(&id).unwrap();
        assert_eq!(snap.message_count, 1);
        assert_eq!(snap.metrics.successful_actions, 1);
    }

    #[tokio::test]
    async fn unknown_target_agent_reports_error_without_touching_router() {
        let data_dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(AgentRegistry::new(data_dir.path().join("agents")));
        let memory = Arc::new(MemoryStore::new(data_dir.path().join("memory"), 100, 32_000));
        let router = Arc::new(Router::new());

        let orchestrator = Orchestrator::new(registry, memory, router, 20);
        let http = Arc::new(evoclaw_channel::HttpChannel::new("http", 8));
        orchestrator.register_channel(http.clone());
        orchestrator.start().await.unwrap();

        let msg = Message::new("http", "tester", AgentId::from("ghost"), "hello");
        let message_id = msg.id.clone();
        let waiter = {
            let http = http.clone();
            tokio::spawn(async move { http.wait_for_response(Context::background(), message_id).await })
        };
        http.submit(Context::background(), msg).await.unwrap();

        let resp = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap().unwrap();
        assert!(resp.content.contains("not found"));

        orchestrator.shutdown().await;
    }
}
