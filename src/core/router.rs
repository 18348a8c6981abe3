//! WhatsApp agent router - Assigns guest conversations to front-desk agents.
//!
//! The router keeps agents, conversations and the waiting queue in memory,
//! behind a single [`Mutex`]. It is meant for a single running instance; a
//! restart forgets every assignment. The lock is never held across an
//! `.await`: [`AgentRouter::send_as_agent`] checks state, releases the lock,
//! sends, then re-locks to record the outbound message.
//!
//! A conversation that cannot be assigned (no agent online with a free slot)
//! is kept as `waiting` and its phone number is queued. The queue drains
//! whenever capacity appears: an agent registers or comes online, or a
//! conversation is resolved or expires.

use crate::{
    config::{LoadBalancing, RouterSettings},
    core::whatsapp::MessageTransport,
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const URGENT_KEYWORDS: &[&str] = &["emergencia", "urgente", "ayuda", "problema", "error"];
const HIGH_KEYWORDS: &[&str] = &["reserva", "cancelar", "cambiar", "problema"];
const MEDIUM_KEYWORDS: &[&str] = &["precio", "disponibilidad", "información", "informacion"];

/// Front desk opening hour (inclusive).
pub const BUSINESS_OPEN_HOUR: u32 = 8;
/// Front desk closing hour (exclusive).
pub const BUSINESS_CLOSE_HOUR: u32 = 22;

/// Whether an agent accepts new conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Accepting conversations
    Online,
    /// Keeps current conversations, receives no new ones
    Busy,
    /// Not working
    Offline,
}

/// Request to add an agent to the router.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    /// Unique agent ID (e.g. staff Discord ID or employee code)
    pub id: String,
    /// Display name
    pub name: String,
    /// Agent's own phone, if any
    #[serde(default)]
    pub phone: Option<String>,
}

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique agent ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Agent's own phone
    pub phone: Option<String>,
    /// Availability
    pub status: AgentStatus,
    /// Phones of the clients currently assigned
    pub assigned_clients: Vec<String>,
    /// Assignment cap
    pub max_clients: usize,
    /// When the agent registered
    pub registered_at: DateTime<Utc>,
    /// Last assignment or outbound message
    pub last_activity: DateTime<Utc>,
}

impl Agent {
    fn has_capacity(&self) -> bool {
        self.status == AgentStatus::Online && self.assigned_clients.len() < self.max_clients
    }
}

/// Lifecycle of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Assigned to an agent
    Active,
    /// Queued for the next free agent
    Waiting,
    /// Closed by an agent or by inactivity
    Resolved,
}

/// Urgency derived from the client's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// No keyword matched
    Low,
    /// Price or availability questions
    Medium,
    /// Booking changes
    High,
    /// Emergencies and problems
    Urgent,
}

/// Direction of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the client
    Inbound,
    /// From an agent
    Outbound,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Who sent it
    pub direction: Direction,
    /// Message text
    pub body: String,
    /// When it was sent or received
    pub timestamp: DateTime<Utc>,
    /// Sending agent, for outbound messages
    pub agent_id: Option<String>,
}

/// A client's conversation with the front desk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Normalised client phone
    pub client_phone: String,
    /// Client's WhatsApp display name
    pub client_name: Option<String>,
    /// Assigned agent, `None` while waiting
    pub assigned_to: Option<String>,
    /// Lifecycle state
    pub status: ConversationStatus,
    /// Highest priority seen so far
    pub priority: Priority,
    /// When the conversation (re)opened
    pub started_at: DateTime<Utc>,
    /// Last inbound or outbound message
    pub last_message_at: DateTime<Utc>,
    /// Every message, oldest first
    pub history: Vec<HistoryEntry>,
}

/// An inbound chat message, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Transport message ID
    pub id: String,
    /// Sender phone, in any format
    pub from: String,
    /// Sender display name
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Message text
    pub body: String,
    /// When the message was sent
    pub timestamp: DateTime<Utc>,
    /// Sent to a group chat
    #[serde(default)]
    pub is_group: bool,
    /// Sent by the hotel's own number
    #[serde(default)]
    pub from_me: bool,
}

/// What [`AgentRouter::handle_incoming`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoutingOutcome {
    /// Group or self message, dropped
    Ignored,
    /// Added to an open conversation
    Appended {
        /// Current agent, `None` while still waiting
        agent_id: Option<String>,
    },
    /// New conversation assigned to an agent
    Assigned {
        /// Chosen agent
        agent_id: String,
    },
    /// New conversation waiting for a free agent
    Queued,
}

/// Where an unregistered agent's conversations went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reassignment {
    /// (client phone, new agent) pairs
    pub reassigned: Vec<(String, String)>,
    /// Client phones left waiting in the queue
    pub queued: Vec<String>,
}

/// Overall router health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Transport connected and at least one agent accepting conversations
    Operational,
    /// Transport connected but clients are waiting or nobody is online
    Degraded,
    /// Transport disconnected
    Down,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStatus {
    /// Health summary
    pub health: Health,
    /// Transport connectivity
    pub transport_connected: bool,
    /// Selection strategy
    pub strategy: String,
    /// Registered agents
    pub total_agents: usize,
    /// Agents currently online
    pub online_agents: usize,
    /// Conversations assigned to an agent
    pub active_conversations: usize,
    /// Conversations waiting for an agent
    pub waiting_conversations: usize,
    /// Queue length
    pub queued: usize,
}

#[derive(Debug, Default)]
struct RouterState {
    /// Registration order, which round-robin follows
    agents: Vec<Agent>,
    conversations: HashMap<String, Conversation>,
    queue: VecDeque<String>,
    cursor: usize,
}

/// In-memory conversation router.
#[derive(Debug)]
pub struct AgentRouter {
    settings: RouterSettings,
    state: Mutex<RouterState>,
}

impl AgentRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new(settings: RouterSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Router settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        // State stays consistent between statements, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Normalises a phone number with this router's country code.
    #[must_use]
    pub fn format_phone(&self, raw: &str) -> String {
        format_phone_number(raw, &self.settings.country_code)
    }

    /// Adds an agent as `online` and immediately hands it queued conversations.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The ID or name is blank
    /// - The ID is already registered, or `max_agents` is reached
    pub fn register_agent(&self, registration: AgentRegistration) -> Result<Agent> {
        let id = registration.id.trim().to_string();
        let name = registration.name.trim().to_string();
        if id.is_empty() || name.is_empty() {
            return Err(Error::validation("Agent ID and name are required"));
        }

        let mut state = self.lock();
        if state.agents.iter().any(|a| a.id == id) {
            return Err(Error::AgentLimitReached {
                reason: format!("agent {id} is already registered"),
            });
        }
        if state.agents.len() >= self.settings.max_agents {
            return Err(Error::AgentLimitReached {
                reason: format!("maximum of {} agents reached", self.settings.max_agents),
            });
        }

        let now = Utc::now();
        state.agents.push(Agent {
            id: id.clone(),
            name,
            phone: registration.phone.map(|p| self.format_phone(&p)),
            status: AgentStatus::Online,
            assigned_clients: Vec::new(),
            max_clients: self.settings.max_clients_per_agent,
            registered_at: now,
            last_activity: now,
        });
        info!("Registered agent {id}");

        self.drain_queue(&mut state, now);
        find_agent(&state, &id)
            .cloned()
            .ok_or(Error::AgentNotFound { id })
    }

    /// Removes an agent, then moves each of its open conversations to another
    /// agent or, when nobody is free, back to the waiting queue.
    ///
    /// # Errors
    /// Returns [`Error::AgentNotFound`] if the agent is not registered.
    pub fn unregister_agent(&self, agent_id: &str) -> Result<Reassignment> {
        let mut state = self.lock();
        let position = state
            .agents
            .iter()
            .position(|a| a.id == agent_id)
            .ok_or_else(|| Error::AgentNotFound {
                id: agent_id.to_string(),
            })?;

        // Remove first so the agent cannot be picked for its own clients.
        let removed = state.agents.remove(position);
        if state.cursor > position {
            state.cursor -= 1;
        }

        let now = Utc::now();
        let mut outcome = Reassignment::default();
        for phone in removed.assigned_clients {
            let open = state
                .conversations
                .get(&phone)
                .is_some_and(|c| c.status != ConversationStatus::Resolved);
            if !open {
                continue;
            }
            if let Some(new_agent) = self.assign(&mut state, &phone, now) {
                outcome.reassigned.push((phone, new_agent));
            } else {
                if let Some(conversation) = state.conversations.get_mut(&phone) {
                    conversation.assigned_to = None;
                    conversation.status = ConversationStatus::Waiting;
                }
                state.queue.push_back(phone.clone());
                outcome.queued.push(phone);
            }
        }

        info!(
            "Unregistered agent {agent_id}: {} reassigned, {} queued",
            outcome.reassigned.len(),
            outcome.queued.len()
        );
        Ok(outcome)
    }

    /// Changes an agent's status; going `online` drains the queue.
    ///
    /// # Errors
    /// Returns [`Error::AgentNotFound`] if the agent is not registered.
    pub fn update_agent_status(&self, agent_id: &str, status: AgentStatus) -> Result<Agent> {
        let mut state = self.lock();
        let agent = find_agent_mut(&mut state, agent_id)?;
        agent.status = status;
        debug!("Agent {agent_id} is now {status:?}");

        if status == AgentStatus::Online {
            self.drain_queue(&mut state, Utc::now());
        }
        find_agent(&state, agent_id)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound {
                id: agent_id.to_string(),
            })
    }

    /// Routes an inbound message to its conversation, opening one if needed.
    pub fn handle_incoming(&self, message: ChatMessage) -> RoutingOutcome {
        if message.is_group || message.from_me {
            return RoutingOutcome::Ignored;
        }

        let phone = self.format_phone(&message.from);
        let priority = calculate_priority(&message.body);
        let entry = HistoryEntry {
            direction: Direction::Inbound,
            body: message.body,
            timestamp: message.timestamp,
            agent_id: None,
        };

        let mut state = self.lock();

        if let Some(conversation) = state.conversations.get_mut(&phone) {
            conversation.history.push(entry);
            conversation.last_message_at = message.timestamp;
            if message.contact_name.is_some() {
                conversation.client_name = message.contact_name;
            }

            if conversation.status != ConversationStatus::Resolved {
                conversation.priority = conversation.priority.max(priority);
                return RoutingOutcome::Appended {
                    agent_id: conversation.assigned_to.clone(),
                };
            }

            // Reopen a resolved conversation, keeping its history.
            conversation.status = ConversationStatus::Waiting;
            conversation.assigned_to = None;
            conversation.priority = priority;
            conversation.started_at = message.timestamp;
        } else {
            state.conversations.insert(
                phone.clone(),
                Conversation {
                    client_phone: phone.clone(),
                    client_name: message.contact_name,
                    assigned_to: None,
                    status: ConversationStatus::Waiting,
                    priority,
                    started_at: message.timestamp,
                    last_message_at: message.timestamp,
                    history: vec![entry],
                },
            );
        }

        if let Some(agent_id) = self.assign(&mut state, &phone, message.timestamp) {
            info!("Assigned {phone} to agent {agent_id}");
            RoutingOutcome::Assigned { agent_id }
        } else {
            warn!("No agent available for {phone}, queued");
            state.queue.push_back(phone);
            RoutingOutcome::Queued
        }
    }

    /// Closes a client's conversation and frees the agent's slot.
    ///
    /// # Errors
    /// Returns [`Error::ConversationNotFound`] if there is no open conversation.
    pub fn resolve_conversation(&self, phone: &str) -> Result<Conversation> {
        let phone = self.format_phone(phone);
        let mut state = self.lock();
        let resolved = resolve(&mut state, &phone)?;
        self.drain_queue(&mut state, Utc::now());
        Ok(resolved)
    }

    /// Resolves every open conversation idle for longer than the session timeout.
    ///
    /// Returns the phones of the expired conversations.
    pub fn expire_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let timeout = Duration::minutes(self.settings.session_timeout_minutes);
        let mut state = self.lock();

        let expired: Vec<String> = state
            .conversations
            .values()
            .filter(|c| c.status != ConversationStatus::Resolved && now - c.last_message_at > timeout)
            .map(|c| c.client_phone.clone())
            .collect();

        for phone in &expired {
            if let Err(e) = resolve(&mut state, phone) {
                warn!("Could not expire conversation {phone}: {e}");
            }
        }
        if !expired.is_empty() {
            info!("Expired {} idle conversations", expired.len());
            self.drain_queue(&mut state, now);
        }
        expired
    }

    /// Sends a message on behalf of an online agent and records it in the conversation.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The agent is not registered ([`Error::AgentNotFound`]) or not online
    /// - The transport is not connected
    /// - The message text is blank
    /// - The transport fails to send
    pub async fn send_as_agent(
        &self,
        transport: &dyn MessageTransport,
        agent_id: &str,
        to: &str,
        text: &str,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::validation("Message text cannot be empty"));
        }
        {
            let state = self.lock();
            let agent = find_agent(&state, agent_id).ok_or_else(|| Error::AgentNotFound {
                id: agent_id.to_string(),
            })?;
            if agent.status != AgentStatus::Online {
                return Err(Error::AgentUnavailable {
                    id: agent_id.to_string(),
                });
            }
        }
        if !transport.is_connected() {
            return Err(Error::TransportUnavailable {
                message: "WhatsApp is not connected".to_string(),
            });
        }

        let phone = self.format_phone(to);
        let message_id = transport.send_text(&phone, text).await?;

        let now = Utc::now();
        let mut state = self.lock();
        if let Some(conversation) = state.conversations.get_mut(&phone) {
            conversation.history.push(HistoryEntry {
                direction: Direction::Outbound,
                body: text.to_string(),
                timestamp: now,
                agent_id: Some(agent_id.to_string()),
            });
            conversation.last_message_at = now;
        }
        if let Some(agent) = state.agents.iter_mut().find(|a| a.id == agent_id) {
            agent.last_activity = now;
        }
        Ok(message_id)
    }

    /// All agents in registration order.
    #[must_use]
    pub fn agents(&self) -> Vec<Agent> {
        self.lock().agents.clone()
    }

    /// One agent by ID.
    #[must_use]
    pub fn agent(&self, agent_id: &str) -> Option<Agent> {
        find_agent(&self.lock(), agent_id).cloned()
    }

    /// All conversations, most recent activity first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> =
            self.lock().conversations.values().cloned().collect();
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        conversations
    }

    /// One conversation by client phone.
    #[must_use]
    pub fn conversation(&self, phone: &str) -> Option<Conversation> {
        let phone = self.format_phone(phone);
        self.lock().conversations.get(&phone).cloned()
    }

    /// Open conversations assigned to an agent.
    #[must_use]
    pub fn agent_conversations(&self, agent_id: &str) -> Vec<Conversation> {
        self.conversations()
            .into_iter()
            .filter(|c| {
                c.assigned_to.as_deref() == Some(agent_id)
                    && c.status == ConversationStatus::Active
            })
            .collect()
    }

    /// Conversations waiting for an agent.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Health snapshot.
    #[must_use]
    pub fn status(&self, transport_connected: bool) -> RouterStatus {
        let state = self.lock();
        let online_agents = state
            .agents
            .iter()
            .filter(|a| a.status == AgentStatus::Online)
            .count();
        let count = |status| {
            state
                .conversations
                .values()
                .filter(|c| c.status == status)
                .count()
        };
        let queued = state.queue.len();

        let health = if !transport_connected {
            Health::Down
        } else if online_agents == 0 || queued > 0 {
            Health::Degraded
        } else {
            Health::Operational
        };

        RouterStatus {
            health,
            transport_connected,
            strategy: self.settings.strategy.to_string(),
            total_agents: state.agents.len(),
            online_agents,
            active_conversations: count(ConversationStatus::Active),
            waiting_conversations: count(ConversationStatus::Waiting),
            queued,
        }
    }

    /// Picks an agent index according to the configured strategy.
    fn pick_agent(&self, state: &mut RouterState) -> Option<usize> {
        let available: Vec<usize> = state
            .agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.has_capacity())
            .map(|(i, _)| i)
            .collect();
        if available.is_empty() {
            return None;
        }

        match self.settings.strategy {
            LoadBalancing::RoundRobin => {
                let len = state.agents.len();
                let start = state.cursor % len;
                let index = (0..len)
                    .map(|offset| (start + offset) % len)
                    .find(|i| available.contains(i))?;
                state.cursor = (index + 1) % len;
                Some(index)
            }
            LoadBalancing::LeastBusy => available
                .into_iter()
                .min_by_key(|&i| state.agents[i].assigned_clients.len()),
            LoadBalancing::Random => {
                let choice = rand::rng().random_range(0..available.len());
                Some(available[choice])
            }
        }
    }

    /// Assigns a waiting conversation to a free agent, returning the agent ID.
    fn assign(&self, state: &mut RouterState, phone: &str, now: DateTime<Utc>) -> Option<String> {
        let index = self.pick_agent(state)?;
        let agent = &mut state.agents[index];
        agent.assigned_clients.push(phone.to_string());
        agent.last_activity = now;
        let agent_id = agent.id.clone();

        if let Some(conversation) = state.conversations.get_mut(phone) {
            conversation.assigned_to = Some(agent_id.clone());
            conversation.status = ConversationStatus::Active;
        }
        Some(agent_id)
    }

    /// Hands queued conversations to free agents, oldest first.
    fn drain_queue(&self, state: &mut RouterState, now: DateTime<Utc>) {
        while let Some(phone) = state.queue.front().cloned() {
            let waiting = state
                .conversations
                .get(&phone)
                .is_some_and(|c| c.status == ConversationStatus::Waiting);
            if waiting {
                let Some(agent_id) = self.assign(state, &phone, now) else {
                    break;
                };
                debug!("Dequeued {phone} to agent {agent_id}");
            }
            state.queue.pop_front();
        }
    }
}

fn find_agent<'a>(state: &'a RouterState, agent_id: &str) -> Option<&'a Agent> {
    state.agents.iter().find(|a| a.id == agent_id)
}

fn find_agent_mut<'a>(state: &'a mut RouterState, agent_id: &str) -> Result<&'a mut Agent> {
    state
        .agents
        .iter_mut()
        .find(|a| a.id == agent_id)
        .ok_or_else(|| Error::AgentNotFound {
            id: agent_id.to_string(),
        })
}

fn resolve(state: &mut RouterState, phone: &str) -> Result<Conversation> {
    let conversation = state
        .conversations
        .get_mut(phone)
        .filter(|c| c.status != ConversationStatus::Resolved)
        .ok_or_else(|| Error::ConversationNotFound {
            phone: phone.to_string(),
        })?;

    conversation.status = ConversationStatus::Resolved;
    let previous_agent = conversation.assigned_to.take();
    let resolved = conversation.clone();

    if let Some(agent_id) = previous_agent {
        if let Some(agent) = state.agents.iter_mut().find(|a| a.id == agent_id) {
            agent.assigned_clients.retain(|p| p != phone);
        }
    }
    state.queue.retain(|p| p != phone);
    Ok(resolved)
}

/// Urgency of a message from its keywords, case-insensitively.
#[must_use]
pub fn calculate_priority(text: &str) -> Priority {
    let text = text.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if matches(URGENT_KEYWORDS) {
        Priority::Urgent
    } else if matches(HIGH_KEYWORDS) {
        Priority::High
    } else if matches(MEDIUM_KEYWORDS) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Keeps only digits and prefixes the country code when missing.
///
/// Accepts WhatsApp JIDs such as `56912345678@c.us`.
#[must_use]
pub fn format_phone_number(raw: &str, country_code: &str) -> String {
    let number = raw.split('@').next().unwrap_or(raw);
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.starts_with(country_code) {
        digits
    } else {
        format!("{country_code}{digits}")
    }
}

/// Whether the front desk is staffed at this local hour (08:00 to 22:00).
#[must_use]
pub const fn is_business_hours(hour: u32) -> bool {
    hour >= BUSINESS_OPEN_HOUR && hour < BUSINESS_CLOSE_HOUR
}

/// Messages starting with `/` are agent commands.
#[must_use]
pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

/// The command word of a message, lowercased, without arguments.
#[must_use]
pub fn extract_command(text: &str) -> Option<String> {
    if !is_command(text) {
        return None;
    }
    text.split_whitespace().next().map(str::to_lowercase)
}
