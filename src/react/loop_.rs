//! 单个智能体实例的回合主循环
//!
//! Resolving → {Completing ⇄ ToolCalling | Delegating | Disambiguating}，返回回合的最终回复。
//! 只修改传入的实例，不写存储、不发根回合的终止事件（由 Orchestrator 在提交后发出）。
//! 委派时子实例在自己的通道上发出 done / error，由父实例转发。
//! 每个外部等待点（补全、工具、子回合）都会检查取消令牌。

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::{AgentDefinition, AgentInstance};
use crate::core::{AgentError, OrchestratorSettings, TurnPhase};
use crate::intent::{IntentKind, IntentResolver, RouteDecision};
use crate::llm::{Completion, CompletionChunk, CompletionRequest, LlmError};
use crate::memory::{context_window, Message, PendingCandidate, RoutingState, ToolCallDescriptor};
use crate::react::disambiguation::{parse_choice, render_prompt, to_pending};
use crate::react::EventKind;
use crate::tools::{Tool, ToolExecutor, ToolOutcome, ToolOutcomeKind};

/// 一次回合共享的只读上下文
#[derive(Clone, Copy)]
pub struct TurnContext<'a> {
    pub settings: &'a OrchestratorSettings,
    pub resolver: &'a IntentResolver,
    pub executor: &'a ToolExecutor,
    pub cancel: &'a CancellationToken,
}

/// 在实例上运行一个回合（委派时递归调用，故返回装箱 future）
pub fn run_turn<'a>(
    instance: &'a mut AgentInstance,
    text: String,
    ctx: TurnContext<'a>,
) -> BoxFuture<'a, Result<String, AgentError>> {
    async move { turn(instance, text, ctx).await }.boxed()
}

async fn turn(
    instance: &mut AgentInstance,
    text: String,
    ctx: TurnContext<'_>,
) -> Result<String, AgentError> {
    let def = Arc::clone(instance.definition());
    instance.phase = TurnPhase::Resolving;

    if let RoutingState::AwaitingChoice { utterance, candidates } = instance.routing.clone() {
        instance.messages.push(Message::user(text.as_str()));
        return match parse_choice(&text, candidates.len()) {
            Some(idx) => {
                instance.routing = RoutingState::Idle;
                let chosen = &candidates[idx];
                debug!(agent = %def.name(), target = %chosen.target, "disambiguation resolved");
                execute_route(instance, chosen.kind, &chosen.target, utterance, ctx).await
            }
            None => Ok(disambiguate(instance, candidates)),
        };
    }

    instance.messages.push(Message::user(text.as_str()));

    if ctx.settings.mention_routing {
        if let Some((name, rest)) = parse_mention(&text) {
            if let Some(sub) = def.find_sub_agent(name) {
                let forwarded = if rest.is_empty() { text.clone() } else { rest.to_string() };
                debug!(agent = %def.name(), target = %sub.name(), "mention routing");
                return delegate(instance, sub.name(), forwarded, ctx).await;
            }
        }
    }

    let matches = guarded(
        ctx.cancel,
        ctx.settings.completion_timeout,
        "intent resolution",
        ctx.resolver.resolve(def.catalog(), &text),
    )
    .await??;

    match ctx.resolver.decide(&matches) {
        RouteDecision::NoMatch => {
            if ctx.settings.sticky_delegation {
                if let Some(active) = instance.active_agent.clone() {
                    if def.capabilities().agent(&active).is_some() {
                        debug!(agent = %def.name(), target = %active, "sticky delegation");
                        return delegate(instance, &active, text, ctx).await;
                    }
                }
            }
            complete(instance, &def, ctx).await
        }
        RouteDecision::Route(m) => {
            debug!(
                agent = %def.name(),
                target = %m.intent.target,
                kind = m.intent.kind.as_str(),
                score = m.score,
                "intent routed"
            );
            execute_route(instance, m.intent.kind, &m.intent.target, text, ctx).await
        }
        RouteDecision::Ambiguous(close) => {
            let candidates = to_pending(&close);
            instance.routing = RoutingState::AwaitingChoice {
                utterance: text,
                candidates: candidates.clone(),
            };
            Ok(disambiguate(instance, candidates))
        }
    }
}

async fn execute_route(
    instance: &mut AgentInstance,
    kind: IntentKind,
    target: &str,
    text: String,
    ctx: TurnContext<'_>,
) -> Result<String, AgentError> {
    let def = Arc::clone(instance.definition());
    match kind {
        IntentKind::Raw => {
            instance.emitter.emit(EventKind::MessageChunk {
                text: target.to_string(),
            });
            instance.messages.push(Message::assistant(target));
            Ok(target.to_string())
        }
        IntentKind::Agent => delegate(instance, target, text, ctx).await,
        IntentKind::Tool => {
            let tool = def
                .capabilities()
                .tool(target)
                .cloned()
                .ok_or_else(|| AgentError::UnknownCapability(target.to_string()))?;
            let call = ToolCallDescriptor::new(target, serde_json::json!({}));
            instance.messages.push(Message::tool_request("", call.clone()));
            run_tool(instance, Some(tool), call, ctx).await?;
            complete(instance, &def, ctx).await
        }
    }
}

fn disambiguate(instance: &mut AgentInstance, candidates: Vec<PendingCandidate>) -> String {
    instance.phase = TurnPhase::Disambiguating;
    let prompt = render_prompt(&candidates);
    instance.emitter.emit(EventKind::Disambiguate {
        prompt: prompt.clone(),
        candidates,
    });
    instance.messages.push(Message::assistant(prompt.as_str()));
    prompt
}

/// Completing ⇄ ToolCalling，直到模型给出普通回答或工具调用次数超限
async fn complete(
    instance: &mut AgentInstance,
    def: &AgentDefinition,
    ctx: TurnContext<'_>,
) -> Result<String, AgentError> {
    let limit = ctx.settings.max_tool_loops;
    let mut tool_calls = 0usize;
    loop {
        instance.phase = TurnPhase::Completing;
        match stream_completion(instance, def, ctx).await? {
            Completion::Message(text) => {
                instance.messages.push(Message::assistant(text.as_str()));
                return Ok(text);
            }
            Completion::ToolCall { content, call } => {
                tool_calls += 1;
                if tool_calls > limit {
                    warn!(agent = %def.name(), limit, "tool loop exceeded");
                    return Err(AgentError::ToolLoopExceeded { limit });
                }
                instance.messages.push(Message::tool_request(content, call.clone()));
                let tool = def.capabilities().tool(&call.name).cloned();
                run_tool(instance, tool, call, ctx).await?;
            }
        }
    }
}

/// 调用补全提供方；文本块即时作为 message_chunk 发出
async fn stream_completion(
    instance: &mut AgentInstance,
    def: &AgentDefinition,
    ctx: TurnContext<'_>,
) -> Result<Completion, AgentError> {
    let window = context_window(&instance.messages, ctx.settings.max_context_messages);
    let request = CompletionRequest {
        system_prompt: def.system_prompt(),
        messages: window,
        tools: def.tool_schemas(),
    };
    let emitter = &mut instance.emitter;
    let provider = def.provider();

    let streaming = async {
        let mut stream = provider.complete_stream(request).await?;
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                CompletionChunk::Text(text) => {
                    if !text.is_empty() {
                        emitter.emit(EventKind::MessageChunk { text: text.clone() });
                    }
                    content.push_str(&text);
                }
                CompletionChunk::ToolCall(call) => {
                    return Ok(Completion::ToolCall { content, call });
                }
            }
        }
        Ok::<_, LlmError>(Completion::Message(content))
    };

    let completion = guarded(
        ctx.cancel,
        ctx.settings.completion_timeout,
        "completion",
        streaming,
    )
    .await??;
    Ok(completion)
}

/// 执行工具并把结果（或错误）作为 tool 消息写回窗口；只有取消会返回 Err
async fn run_tool(
    instance: &mut AgentInstance,
    tool: Option<Arc<dyn Tool>>,
    call: ToolCallDescriptor,
    ctx: TurnContext<'_>,
) -> Result<(), AgentError> {
    instance.phase = TurnPhase::ToolCalling;
    instance.emitter.emit(EventKind::ToolCallStart {
        tool: call.name.clone(),
        call_id: call.id.clone(),
        args: call.arguments.clone(),
    });

    let outcome = match tool {
        Some(tool) => {
            cancellable(
                ctx.cancel,
                ctx.executor.execute(tool.as_ref(), call.arguments.clone()),
            )
            .await?
        }
        None => ToolOutcome {
            kind: ToolOutcomeKind::Error,
            content: format!("unknown tool: {}", call.name),
        },
    };
    if outcome.is_error() {
        warn!(
            agent = %instance.path(),
            tool = %call.name,
            outcome = outcome.kind.as_str(),
            "tool failed, returning error to the model"
        );
    }

    instance.emitter.emit(EventKind::ToolCallEnd {
        tool: call.name.clone(),
        call_id: call.id.clone(),
        result: outcome.content.clone(),
        is_error: outcome.is_error(),
    });
    let is_error = outcome.is_error();
    instance
        .messages
        .push(Message::tool_result(&call, outcome.content, is_error));
    Ok(())
}

/// 把回合交给子实例：转发其事件，超时或失败即中止，成功则把回复折叠为本实例的 assistant 消息
async fn delegate(
    instance: &mut AgentInstance,
    target: &str,
    text: String,
    ctx: TurnContext<'_>,
) -> Result<String, AgentError> {
    instance.phase = TurnPhase::Delegating;
    let limit = ctx.settings.delegation_timeout;

    let (child, emitter) = instance
        .split_child(target)
        .ok_or_else(|| AgentError::UnknownCapability(target.to_string()))?;
    let mut events = child
        .take_events()
        .ok_or_else(|| AgentError::UnknownCapability(format!("{target} (event channel detached)")))?;

    emitter.emit(EventKind::Delegate {
        target: target.to_string(),
        text: text.clone(),
    });

    let outcome = {
        let mut sub_turn = run_delegated(child, text, ctx);
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => {
                    emitter.forward(event);
                }
                result = &mut sub_turn => break Ok(result),
                _ = &mut deadline => {
                    break Err(AgentError::Timeout {
                        stage: "delegation",
                        millis: millis(limit),
                    })
                }
            }
        }
    };
    for event in events.drain() {
        emitter.forward(event);
    }
    child.put_events(events);

    match outcome? {
        Ok(reply) => {
            instance.messages.push(Message::assistant(reply.as_str()));
            instance.active_agent = Some(target.to_string());
            Ok(reply)
        }
        Err(e) => Err(AgentError::delegated(target, e)),
    }
}

/// 子回合：结束时在子实例自己的通道上发出终止事件
fn run_delegated<'a>(
    child: &'a mut AgentInstance,
    text: String,
    ctx: TurnContext<'a>,
) -> BoxFuture<'a, Result<String, AgentError>> {
    async move {
        let result = run_turn(&mut *child, text, ctx).await;
        match &result {
            Ok(reply) => {
                child.emitter.emit(EventKind::Done {
                    message: reply.clone(),
                });
                child.phase = TurnPhase::Idle;
            }
            Err(e) => {
                child.emitter.emit(EventKind::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                child.phase = TurnPhase::Terminated;
            }
        }
        result
    }
    .boxed()
}

/// 外部等待点：先看取消，再看超时
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    limit: Duration,
    stage: &'static str,
    fut: F,
) -> Result<F::Output, AgentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        result = tokio::time::timeout(limit, fut) => result.map_err(|_| AgentError::Timeout {
            stage,
            millis: millis(limit),
        }),
    }
}

/// 超过 u64 的时长按 u64::MAX 记
fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, AgentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        out = fut => Ok(out),
    }
}

static MENTION_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// `@Name rest` / `@Name: rest` → (Name, rest)
pub fn parse_mention(text: &str) -> Option<(&str, &str)> {
    let re = MENTION_RE
        .get_or_init(|| Regex::new(r"(?s)^\s*@([^\s:,]+)[:,]*\s*(.*)$").ok())
        .as_ref()?;
    let caps = re.captures(text)?;
    let name = caps.get(1)?.as_str();
    let rest = caps.get(2).map_or("", |m| m.as_str().trim());
    Some((name, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mention() {
        assert_eq!(parse_mention("@Greeter ABI"), Some(("Greeter", "ABI")));
        assert_eq!(parse_mention("  @Greeter: hello there"), Some(("Greeter", "hello there")));
        assert_eq!(parse_mention("@Greeter"), Some(("Greeter", "")));
        assert_eq!(parse_mention("@ nobody"), None);
        assert_eq!(parse_mention("mail me @ home"), None);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
