use serde_json::{json, Value};

/// Trace creation body with every required field and judge consent granted.
pub fn trace_request() -> Value {
    json!({
        "repo": {
            "repo_id": "acme/widgets",
            "remote_url": "https://example.com/acme/widgets.git",
            "commit_base": "4f2a9c1"
        },
        "task": {
            "bug_report": {
                "title": "Pagination drops the last item",
                "description": "Requesting page 2 of 3 items returns only 2.",
                "expected": "All items are returned across pages"
            },
            "labels": ["bug"]
        },
        "developer": {
            "developer_id": "dev-42",
            "experience_level": "mid",
            "consent_flags": {"allow_llm_judge": true}
        },
        "environment": {
            "os": "linux",
            "ide": {"name": "vscode", "version": "1.90"},
            "language": ["python"]
        }
    })
}

pub fn trace_request_without_judge_consent() -> Value {
    let mut request = trace_request();
    request["developer"]["consent_flags"]["allow_llm_judge"] = json!(false);
    request
}

pub fn thought(seq: u64, event_id: &str, content_blob_id: &str) -> Value {
    json!({
        "event_id": event_id,
        "seq": seq,
        "ts_ms": 1_700_000_000_000_u64 + seq,
        "type": "thought",
        "actor": {"kind": "human"},
        "payload": {"content_blob_id": content_blob_id, "kind": "hypothesis"}
    })
}

pub fn file_edit(seq: u64, event_id: &str) -> Value {
    json!({
        "event_id": event_id,
        "seq": seq,
        "ts_ms": 1_700_000_000_000_u64 + seq,
        "type": "file_edit",
        "actor": {"kind": "human"},
        "payload": {
            "file_path": "src/paginate.py",
            "edit_kind": "patch",
            "patch_blob_id": "sha256:0000000000000000000000000000000000000000000000000000000000000000"
        }
    })
}

pub fn batch(events: Vec<Value>) -> Value {
    json!({ "events": events })
}

pub fn finalize_request() -> Value {
    json!({"final_state": {"commit_head": "abc"}})
}
