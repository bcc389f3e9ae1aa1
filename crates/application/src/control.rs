use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use domain::common::entity::Action;
use domain::conntrack::entity::FlowRecord;
use domain::filter::entity::FilterRule;
use domain::logbuf::entity::LogRecord;
use domain::nat::entity::NatRule;

use crate::engine::Engine;

/// Typed control-plane request. The transport adapter decodes wire frames
/// into these; the handler never sees bytes.
#[derive(Debug)]
pub enum Request {
    ListFilterRules,
    AddFilterRule { anchor: String, rule: FilterRule },
    DeleteFilterRule { name: String },
    SetDefaultAction { action: Action },
    ListLogs { newest: u32 },
    ListConnections,
    AddNatRule { rule: NatRule },
    DeleteNatRule { index: i64 },
    ListNatRules,
}

/// Typed control-plane response. `body_type`/`array_len` give the wire
/// header for each variant.
#[derive(Debug)]
pub enum Response {
    FilterRules(Vec<FilterRule>),
    NatRules(Vec<NatRule>),
    Logs(Vec<LogRecord>),
    Connections(Vec<FlowRecord>),
    Message(String),
    HeadOnly { count: u32 },
}

impl Response {
    pub fn body_type(&self) -> u32 {
        match self {
            Self::FilterRules(_) => wire::RSP_IP_RULES,
            Self::NatRules(_) => wire::RSP_NAT_RULES,
            Self::Logs(_) => wire::RSP_IP_LOGS,
            Self::Connections(_) => wire::RSP_CONN_LOGS,
            Self::Message(_) => wire::RSP_MSG,
            Self::HeadOnly { .. } => wire::RSP_HEAD_ONLY,
        }
    }

    pub fn array_len(&self) -> u32 {
        match self {
            Self::FilterRules(rules) => rules.len() as u32,
            Self::NatRules(rules) => rules.len() as u32,
            Self::Logs(records) => records.len() as u32,
            Self::Connections(records) => records.len() as u32,
            Self::Message(text) => text.len() as u32,
            Self::HeadOnly { count } => *count,
        }
    }
}

/// Execute one request against the engine.
///
/// Rule mutations answer with a status string; deletions answer with a
/// head-only response whose `array_len` is the removed count. Malformed
/// input (bad rule, negative index) is rejected here with no state
/// change.
pub fn handle(engine: &Engine, request: Request) -> Response {
    match request {
        Request::ListFilterRules => Response::FilterRules(engine.filter_rules()),

        Request::AddFilterRule { anchor, rule } => {
            let name = rule.name.clone();
            match engine.add_filter_rule(&anchor, rule) {
                Ok(()) => {
                    info!(rule = %name, "filter rule added");
                    Response::Message("Success.".to_string())
                }
                Err(e) => Response::Message(format!("Fail: {e}.")),
            }
        }

        Request::DeleteFilterRule { name } => {
            let removed = engine.delete_filter_rules(&name);
            info!(rule = %name, removed, "filter rules deleted");
            Response::HeadOnly {
                count: removed as u32,
            }
        }

        Request::SetDefaultAction { action } => {
            let purged = engine.set_default_action(action);
            info!(action = %action, purged, "default action changed");
            match action {
                Action::Accept => Response::Message("Set default action to ACCEPT.".to_string()),
                Action::Drop => Response::Message("Set default action to DROP.".to_string()),
            }
        }

        Request::ListLogs { newest } => Response::Logs(engine.logs(newest as usize)),

        Request::ListConnections => Response::Connections(engine.connections()),

        Request::AddNatRule { rule } => match engine.add_nat_rule(rule) {
            Ok(()) => {
                info!(nat_ip = rule.nat_ip, "NAT rule added");
                Response::Message("Success.".to_string())
            }
            Err(e) => Response::Message(format!("Fail: {e}.")),
        },

        Request::DeleteNatRule { index } => {
            if index < 0 {
                return Response::Message("Fail: invalid NAT rule index.".to_string());
            }
            let removed = engine.delete_nat_rule(index as usize);
            info!(index, removed, "NAT rule delete");
            Response::HeadOnly {
                count: removed as u32,
            }
        }

        Request::ListNatRules => Response::NatRules(engine.nat_rules()),
    }
}

/// One in-flight control exchange.
#[derive(Debug)]
pub struct ControlMessage {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Control-plane task: serializes all requests onto one consumer so rule
/// mutations are linearized. Drains queued requests on cancellation
/// before exiting.
pub async fn run_control(
    engine: Arc<Engine>,
    mut rx: mpsc::Receiver<ControlMessage>,
    cancel: CancellationToken,
) {
    let mut count: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                while let Ok(msg) = rx.try_recv() {
                    count += 1;
                    let response = handle(&engine, msg.request);
                    let _ = msg.reply.send(response);
                }
                break;
            }
            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        count += 1;
                        let response = handle(&engine, msg.request);
                        debug!(body_type = response.body_type(), "control request handled");
                        let _ = msg.reply.send(response);
                    }
                    None => break, // all senders gone
                }
            }
        }
    }

    info!(total_requests = count, "control handler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::addr::entity::{Ipv4Net, PortRange};
    use domain::common::entity::{Protocol, RuleName};

    fn make_rule(name: &str, action: Action) -> FilterRule {
        FilterRule {
            name: RuleName(name.to_string()),
            src_net: Ipv4Net::ANY,
            dst_net: Ipv4Net::ANY,
            src_ports: PortRange::ANY,
            dst_ports: PortRange::ANY,
            protocol: Protocol::Any,
            action,
            log: false,
        }
    }

    fn make_nat_rule() -> NatRule {
        NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(40000, 60000),
        )
    }

    #[test]
    fn add_then_list_filter_rules() {
        let engine = Engine::new();
        let rsp = handle(
            &engine,
            Request::AddFilterRule {
                anchor: String::new(),
                rule: make_rule("blk", Action::Accept),
            },
        );
        assert!(matches!(rsp, Response::Message(ref m) if m == "Success."));

        let rsp = handle(&engine, Request::ListFilterRules);
        match rsp {
            Response::FilterRules(rules) => assert_eq!(rules.len(), 1),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn add_with_unknown_anchor_fails_with_message() {
        let engine = Engine::new();
        let rsp = handle(
            &engine,
            Request::AddFilterRule {
                anchor: "ghost".to_string(),
                rule: make_rule("x", Action::Accept),
            },
        );
        match rsp {
            Response::Message(m) => assert!(m.starts_with("Fail:"), "got: {m}"),
            other => panic!("unexpected response {other:?}"),
        }
        assert!(engine.filter_rules().is_empty());
    }

    #[test]
    fn delete_reports_removed_count_in_header() {
        let engine = Engine::new();
        for _ in 0..2 {
            handle(
                &engine,
                Request::AddFilterRule {
                    anchor: String::new(),
                    rule: make_rule("dup", Action::Accept),
                },
            );
        }
        let rsp = handle(
            &engine,
            Request::DeleteFilterRule {
                name: "dup".to_string(),
            },
        );
        assert!(matches!(rsp, Response::HeadOnly { count: 2 }));
        assert_eq!(rsp.body_type(), wire::RSP_HEAD_ONLY);
        assert_eq!(rsp.array_len(), 2);
    }

    #[test]
    fn set_default_action_messages() {
        let engine = Engine::new();
        let rsp = handle(
            &engine,
            Request::SetDefaultAction {
                action: Action::Drop,
            },
        );
        assert!(matches!(rsp, Response::Message(ref m) if m.contains("DROP")));
        assert_eq!(engine.default_action(), Action::Drop);
    }

    #[test]
    fn negative_nat_index_rejected_without_change() {
        let engine = Engine::new();
        handle(
            &engine,
            Request::AddNatRule {
                rule: make_nat_rule(),
            },
        );
        let rsp = handle(&engine, Request::DeleteNatRule { index: -1 });
        assert!(matches!(rsp, Response::Message(ref m) if m.starts_with("Fail:")));
        assert_eq!(engine.nat_rules().len(), 1);
    }

    #[test]
    fn out_of_range_nat_index_removes_nothing() {
        let engine = Engine::new();
        let rsp = handle(&engine, Request::DeleteNatRule { index: 7 });
        assert!(matches!(rsp, Response::HeadOnly { count: 0 }));
    }

    #[test]
    fn invalid_nat_rule_rejected_with_message() {
        let engine = Engine::new();
        let mut rule = make_nat_rule();
        rule.port_pool = PortRange::new(2, 1);
        let rsp = handle(&engine, Request::AddNatRule { rule });
        assert!(matches!(rsp, Response::Message(ref m) if m.starts_with("Fail:")));
        assert!(engine.nat_rules().is_empty());
    }

    #[test]
    fn list_logs_and_connections_empty_engine() {
        let engine = Engine::new();
        assert!(matches!(
            handle(&engine, Request::ListLogs { newest: 0 }),
            Response::Logs(ref v) if v.is_empty()
        ));
        assert!(matches!(
            handle(&engine, Request::ListConnections),
            Response::Connections(ref v) if v.is_empty()
        ));
    }

    #[test]
    fn response_body_types_match_protocol() {
        assert_eq!(Response::FilterRules(vec![]).body_type(), wire::RSP_IP_RULES);
        assert_eq!(Response::NatRules(vec![]).body_type(), wire::RSP_NAT_RULES);
        assert_eq!(Response::Logs(vec![]).body_type(), wire::RSP_IP_LOGS);
        assert_eq!(Response::Connections(vec![]).body_type(), wire::RSP_CONN_LOGS);
        assert_eq!(Response::Message(String::new()).body_type(), wire::RSP_MSG);
        assert_eq!(Response::HeadOnly { count: 0 }.body_type(), wire::RSP_HEAD_ONLY);
    }

    #[tokio::test]
    async fn control_loop_answers_and_stops() {
        let engine = Arc::new(Engine::new());
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_control(engine, rx, cancel.clone()));

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(ControlMessage {
            request: Request::ListFilterRules,
            reply: reply_tx,
        })
        .await
        .unwrap();
        let rsp = reply_rx.await.unwrap();
        assert!(matches!(rsp, Response::FilterRules(ref v) if v.is_empty()));

        cancel.cancel();
        task.await.unwrap();
    }
}
