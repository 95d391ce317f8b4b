//! 回合过程事件：流式回复、工具调用、委派、消歧与终止标记
//!
//! 每个智能体实例拥有自己的通道；父实例转发子实例事件时重新编号，
//! 因此调用方从根通道看到的 seq 严格递增。depth > 0 的事件来自子智能体，agent 为其路径（如 `Hive/Greeter`）。

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::ErrorKind;
use crate::memory::PendingCandidate;

/// 单个事件（序列化为一行 JSON：`{"type": ..., "thread_id": ..., "seq": ..., ...}`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    pub thread_id: String,
    pub seq: u64,
    pub agent: String,
    pub depth: usize,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TurnEvent {
    /// done / error 是回合的终止标记；子智能体的终止事件 depth > 0，不结束根回合
    pub fn is_terminal(&self) -> bool {
        self.depth == 0 && self.kind.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// 回复的一小段（流式输出）
    MessageChunk { text: String },
    ToolCallStart {
        tool: String,
        call_id: String,
        args: serde_json::Value,
    },
    ToolCallEnd {
        tool: String,
        call_id: String,
        result: String,
        is_error: bool,
    },
    /// 把本回合交给子智能体
    Delegate { target: String, text: String },
    /// 多个同样接近的候选，等待用户输入编号
    Disambiguate {
        prompt: String,
        candidates: Vec<PendingCandidate>,
    },
    Done { message: String },
    Error { kind: ErrorKind, message: String },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Done { .. } | EventKind::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MessageChunk { .. } => "message_chunk",
            EventKind::ToolCallStart { .. } => "tool_call_start",
            EventKind::ToolCallEnd { .. } => "tool_call_end",
            EventKind::Delegate { .. } => "delegate",
            EventKind::Disambiguate { .. } => "disambiguate",
            EventKind::Done { .. } => "done",
            EventKind::Error { .. } => "error",
        }
    }
}

/// 实例的发送端：分配 seq 并写入通道
#[derive(Debug)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<TurnEvent>,
    thread_id: String,
    agent: String,
    depth: usize,
    next_seq: u64,
}

impl EventEmitter {
    /// 新通道：返回发送端与接收端
    pub fn channel(agent: impl Into<String>, depth: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            tx,
            thread_id: String::new(),
            agent: agent.into(),
            depth,
            next_seq: 0,
        };
        (emitter, EventStream { rx })
    }

    pub fn bind(&mut self, thread_id: &str) {
        self.thread_id = thread_id.to_string();
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 发出本实例的事件，返回分配的 seq；接收端已关闭时静默丢弃
    pub fn emit(&mut self, kind: EventKind) -> u64 {
        let seq = self.advance();
        let event = TurnEvent {
            thread_id: self.thread_id.clone(),
            seq,
            agent: self.agent.clone(),
            depth: self.depth,
            kind,
        };
        let _ = self.tx.send(event);
        seq
    }

    /// 转发子实例事件：保留来源 agent 与 depth，改写线程与 seq
    pub fn forward(&mut self, mut event: TurnEvent) -> u64 {
        let seq = self.advance();
        event.seq = seq;
        event.thread_id = self.thread_id.clone();
        let _ = self.tx.send(event);
        seq
    }

    fn advance(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// 实例的接收端
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<TurnEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<TurnEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TurnEvent> {
        self.rx.try_recv().ok()
    }

    /// 取出当前已缓冲的全部事件
    pub fn drain(&mut self) -> Vec<TurnEvent> {
        let mut out = Vec::new();
        while let Some(e) = self.try_recv() {
            out.push(e);
        }
        out
    }
}

impl Stream for EventStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TurnEvent>> {
        self.rx.poll_recv(cx)
    }
}
