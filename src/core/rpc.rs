//! Line-delimited JSON RPC over stdin/stdout.
//!
//! Each input line is one request, `{"id", "op", "params"}`; each gets exactly
//! one response line, `{"id", "ok", "result" | "error"}`. Blank lines are
//! skipped. A line that is not a valid request still gets a response, with a
//! `null` id and a `malformed` error.
//!
//! A request may pin the clock with `params.now` (RFC 3339). The pin lasts for
//! that one request.

use crate::core::error::SpecdeckError;
use crate::core::time::{self, FixedClock};
use crate::core::workspace::Workspace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, Write};
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub op: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcResponse {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, err: &SpecdeckError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(RpcError {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Operation names accepted by [`dispatch`].
pub const OPS: &[&str] = &[
    "create",
    "activate",
    "deactivate",
    "validate",
    "complete",
    "remove",
    "context",
    "list",
    "status",
    "graph",
    "repair",
    "maintenance.list",
    "maintenance.due",
    "maintenance.done",
    "maintenance.new",
];

fn bad_params(reason: String) -> SpecdeckError {
    SpecdeckError::Malformed {
        what: "rpc params".to_string(),
        line: None,
        reason,
    }
}

fn opt_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, SpecdeckError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(bad_params(format!("{key} must be a string, got {other}"))),
    }
}

fn req_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, SpecdeckError> {
    opt_str(params, key)?.ok_or_else(|| bad_params(format!("missing string param {key}")))
}

fn flag(params: &Value, key: &str) -> Result<bool, SpecdeckError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(bad_params(format!("{key} must be a boolean, got {other}"))),
    }
}

fn to_value<T: Serialize>(v: T) -> Result<Value, SpecdeckError> {
    Ok(serde_json::to_value(v)?)
}

/// Run one operation against the workspace.
pub fn dispatch(ws: &Workspace, op: &str, params: &Value) -> Result<Value, SpecdeckError> {
    match op {
        "create" => to_value(serde_json::json!({ "slug": ws.create_proposal(req_str(params, "name")?)? })),
        "activate" => to_value(ws.activate(req_str(params, "slug")?)?),
        "deactivate" => to_value(ws.deactivate(opt_str(params, "slug")?)?),
        "validate" => to_value(ws.validate(req_str(params, "slug")?)?),
        "complete" => to_value(ws.complete(req_str(params, "slug")?)?),
        "remove" => {
            let slug = req_str(params, "slug")?;
            ws.remove(slug, flag(params, "force")?)?;
            to_value(serde_json::json!({ "slug": slug }))
        }
        "context" => to_value(ws.context(opt_str(params, "slug")?, flag(params, "confirm")?)?),
        "list" => to_value(ws.list_proposals()?),
        "status" => to_value(ws.status()?),
        "graph" => to_value(ws.dependency_graph(opt_str(params, "slug")?)?),
        "repair" => to_value(serde_json::json!({ "dropped": ws.repair()? })),
        "maintenance.list" => to_value(ws.list_maintenance()?),
        "maintenance.due" => to_value(ws.due_maintenance()?),
        "maintenance.done" => {
            let slug = req_str(params, "slug")?;
            let id = req_str(params, "id")?;
            let ts = ws.mark_actioned(slug, id)?;
            to_value(serde_json::json!({ "slug": slug, "id": id, "actioned_at": ts }))
        }
        "maintenance.new" => {
            to_value(serde_json::json!({ "slug": ws.create_maintenance_item(req_str(params, "name")?)? }))
        }
        other => Err(SpecdeckError::NotFound(format!("rpc op {other}"))),
    }
}

/// Handle one request, honoring a `now` clock pin.
pub fn handle(ws: &mut Workspace, req: &RpcRequest) -> RpcResponse {
    let pinned = match opt_str(&req.params, "now") {
        Ok(None) => None,
        Ok(Some(raw)) => match time::parse_ts(raw) {
            Some(now) => Some(now),
            None => {
                let err = bad_params(format!("now is not an RFC 3339 timestamp: {raw:?}"));
                return RpcResponse::failure(req.id.clone(), &err);
            }
        },
        Err(e) => return RpcResponse::failure(req.id.clone(), &e),
    };

    let previous = pinned.map(|now| ws.replace_clock(Box::new(FixedClock(now))));
    let outcome = dispatch(ws, &req.op, &req.params);
    if let Some(clock) = previous {
        ws.replace_clock(clock);
    }

    debug!(op = %req.op, ok = outcome.is_ok(), "rpc request handled");
    match outcome {
        Ok(result) => RpcResponse::success(req.id.clone(), result),
        Err(e) => RpcResponse::failure(req.id.clone(), &e),
    }
}

pub fn handle_line(ws: &mut Workspace, line: &str) -> RpcResponse {
    match serde_json::from_str::<RpcRequest>(line) {
        Ok(req) => handle(ws, &req),
        Err(e) => RpcResponse::failure(Value::Null, &SpecdeckError::Json(e)),
    }
}

/// Serve requests until EOF. Returns the number of requests answered.
pub fn serve(ws: &mut Workspace, input: impl BufRead, mut output: impl Write) -> Result<usize, SpecdeckError> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(ws, &line);
        writeln!(output, "{}", serde_json::to_string(&response)?)?;
        output.flush()?;
        answered += 1;
    }
    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::MemRepository;

    fn ws() -> Workspace {
        Workspace::in_memory(
            MemRepository::new()
                .with_proposal("auth", &[("spec.md", "Depends on: none")])
                .with_maintenance("security", "# Security\n## Requirements\n- Scan [id=scan] [freq=weekly]\n"),
        )
    }

    fn call(ws: &mut Workspace, line: &str) -> Value {
        serde_json::to_value(handle_line(ws, line)).unwrap()
    }

    #[test]
    fn activate_then_status() {
        let mut ws = ws();
        let r = call(&mut ws, r#"{"id":1,"op":"activate","params":{"slug":"auth"}}"#);
        assert_eq!(r["id"], 1);
        assert_eq!(r["ok"], true);
        assert_eq!(r["result"]["slug"], "auth");

        let r = call(&mut ws, r#"{"id":"s","op":"status"}"#);
        assert_eq!(r["result"]["primary"], "auth");
    }

    #[test]
    fn errors_carry_kind() {
        let mut ws = ws();
        let r = call(&mut ws, r#"{"id":2,"op":"activate","params":{"slug":"ghost"}}"#);
        assert_eq!(r["ok"], false);
        assert_eq!(r["error"]["kind"], "not_found");
        assert!(r.get("result").is_none());

        let r = call(&mut ws, r#"{"id":3,"op":"activate","params":{}}"#);
        assert_eq!(r["error"]["kind"], "malformed");

        let r = call(&mut ws, r#"{"id":4,"op":"explode"}"#);
        assert_eq!(r["error"]["kind"], "not_found");
    }

    #[test]
    fn unparsable_line_gets_null_id() {
        let mut ws = ws();
        let r = call(&mut ws, "{not json");
        assert_eq!(r["id"], Value::Null);
        assert_eq!(r["error"]["kind"], "malformed");
    }

    #[test]
    fn now_pins_the_clock_for_one_request() {
        let mut ws = ws();
        let r = call(
            &mut ws,
            r#"{"id":1,"op":"maintenance.done","params":{"slug":"security","id":"scan","now":"2026-03-01T09:00:00Z"}}"#,
        );
        assert_eq!(r["result"]["actioned_at"], "2026-03-01T09:00:00Z");

        let r = call(&mut ws, r#"{"id":2,"op":"maintenance.due","params":{"now":"2026-03-08T08:59:59Z"}}"#);
        assert_eq!(r["result"], serde_json::json!([]));
        let r = call(&mut ws, r#"{"id":3,"op":"maintenance.due","params":{"now":"2026-03-08T09:00:00Z"}}"#);
        assert_eq!(r["result"][0]["slug"], "security");

        let r = call(&mut ws, r#"{"id":4,"op":"status","params":{"now":"last tuesday"}}"#);
        assert_eq!(r["error"]["kind"], "malformed");
    }

    #[test]
    fn serve_answers_each_nonblank_line() {
        let mut ws = ws();
        let input = "{\"id\":1,\"op\":\"list\"}\n\n{\"id\":2,\"op\":\"graph\"}\n";
        let mut out = Vec::new();
        let n = serve(&mut ws, input.as_bytes(), &mut out).unwrap();
        assert_eq!(n, 2);
        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"][0]["slug"], "auth");
        assert_eq!(lines[1]["id"], 2);
    }
}
