use crate::error::QueryError;
use crate::indexer::BuildOptions;
use crate::model::{EdgeKind, SymbolKind};
use crate::service::Service;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

pub fn serve(root: PathBuf, rules_path: Option<PathBuf>, options: BuildOptions) -> Result<()> {
    let mut service = Service::with_options(root, options);
    if let Some(rules_path) = rules_path {
        if let Err(err) = service.load_rules(&rules_path) {
            eprintln!("gidx: rules load failed: {err}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(value) => value,
            Err(err) => {
                eprintln!("gidx: stdin error: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(value) => handle_message(value, &mut service),
            Err(err) => Some(jsonrpc_error(
                Value::Null,
                -32700,
                &format!("parse error: {err}"),
            )),
        };

        if let Some(payload) = response {
            writeln!(stdout, "{}", serde_json::to_string(&payload)?)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn handle_message(message: Value, service: &mut Service) -> Option<Value> {
    let id = message.get("id").cloned();
    let method = message.get("method").and_then(|value| value.as_str());

    let Some(method) = method else {
        return id.map(|id| jsonrpc_error(id, -32600, "invalid request"));
    };

    match method {
        "initialize" => {
            let id = id?;
            Some(jsonrpc_result(id, initialize_result(&message)))
        }
        "notifications/initialized" => None,
        "ping" => id.map(|id| jsonrpc_result(id, json!({}))),
        "tools/list" => {
            let id = id?;
            Some(jsonrpc_result(id, json!({ "tools": tool_specs() })))
        }
        "tools/call" => {
            let id = id?;
            Some(handle_tool_call(id, &message, service))
        }
        "resources/list" => id.map(|id| jsonrpc_result(id, json!({ "resources": [] }))),
        "prompts/list" => id.map(|id| jsonrpc_result(id, json!({ "prompts": [] }))),
        _ => id.map(|id| jsonrpc_error(id, -32601, "method not found")),
    }
}

fn initialize_result(message: &Value) -> Value {
    let protocol = message
        .get("params")
        .and_then(|params| params.get("protocolVersion"))
        .cloned()
        .unwrap_or_else(|| Value::String("2024-11-05".to_string()));
    json!({
        "protocolVersion": protocol,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "gidx",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "instructions": "Call init_project first to build the dependency graph. \
Then query_blast_radius tells you what depends on a symbol and what it depends on, \
get_full_context assembles code, rules and tests for a change, and analyze_diff maps \
a unified diff to its impact. find_symbols / get_symbol_code / get_file_symbols \
navigate the symbol table.",
    })
}

#[derive(Deserialize, schemars::JsonSchema)]
struct InitProjectParams {
    /// Project root; defaults to the root the server was started with.
    path: Option<String>,
    /// Markdown file of coding rules for match_coding_rules.
    rules_path: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct BlastRadiusParams {
    symbol: String,
    /// Traversal depth, default 1.
    depth: Option<usize>,
    /// Restrict traversal to these edge kinds, e.g. exclude "references"
    /// when only confirmed impact is wanted.
    edge_kinds: Option<Vec<String>>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct FullContextParams {
    symbol: String,
    /// Include source snippets, default true.
    include_code: Option<bool>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct FindSymbolsParams {
    query: String,
    /// Filter: all, module, class, function, method.
    symbol_type: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct SymbolCodeParams {
    symbol: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct FileSymbolsParams {
    file_path: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct SymbolsOrFilesParams {
    symbols: Option<Vec<String>>,
    files: Option<Vec<String>>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct AnalyzeDiffParams {
    /// Unified diff text.
    diff: String,
    depth: Option<usize>,
}

fn tool_specs() -> Vec<Value> {
    vec![
        tool_spec::<InitProjectParams>(
            "init_project",
            "Build the code dependency graph for the project. Call this first.",
        ),
        tool_spec::<BlastRadiusParams>(
            "query_blast_radius",
            "Dependents and dependencies of a symbol, with affected files.",
        ),
        tool_spec::<FullContextParams>(
            "get_full_context",
            "Blast radius plus source code, matching rules and related tests for a symbol.",
        ),
        tool_spec::<FindSymbolsParams>("find_symbols", "Search symbols by name fragment."),
        tool_spec::<SymbolCodeParams>("get_symbol_code", "Source text and span of a symbol."),
        tool_spec::<FileSymbolsParams>(
            "get_file_symbols",
            "Ordered symbols declared in a file.",
        ),
        tool_spec::<SymbolsOrFilesParams>(
            "get_related_tests",
            "Test files relevant to the given symbols or files.",
        ),
        tool_spec::<SymbolsOrFilesParams>(
            "match_coding_rules",
            "Coding rules relevant to the given symbols or files.",
        ),
        tool_spec::<AnalyzeDiffParams>(
            "analyze_diff",
            "Map a unified diff to changed symbols and their blast radius.",
        ),
    ]
}

fn tool_spec<T: schemars::JsonSchema>(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": schemars::schema_for!(T),
    })
}

fn handle_tool_call(id: Value, message: &Value, service: &mut Service) -> Value {
    let params = message.get("params").cloned().unwrap_or(Value::Null);
    let Some(name) = params.get("name").and_then(|value| value.as_str()) else {
        return jsonrpc_error(id, -32602, "tools/call requires a tool name");
    };
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    match dispatch_tool(name, arguments, service) {
        Ok(result) => jsonrpc_result(id, tool_content(result, false)),
        Err(err) => {
            let payload = match err.downcast_ref::<QueryError>() {
                Some(query_err) => {
                    let mut body = json!({
                        "code": query_err.code(),
                        "message": query_err.to_string(),
                    });
                    if let QueryError::SymbolNotFound { suggestions, .. } = query_err {
                        if !suggestions.is_empty() {
                            body["suggestions"] = json!(suggestions);
                        }
                    }
                    json!({ "error": body })
                }
                None => json!({ "error": { "code": "internal", "message": err.to_string() } }),
            };
            jsonrpc_result(id, tool_content(payload, true))
        }
    }
}

fn dispatch_tool(name: &str, arguments: Value, service: &mut Service) -> Result<Value> {
    match name {
        "init_project" => {
            let params: InitProjectParams = serde_json::from_value(arguments)?;
            let stats = service.init_project(
                params.path.map(PathBuf::from),
                params.rules_path.map(PathBuf::from),
            )?;
            Ok(serde_json::to_value(stats)?)
        }
        "query_blast_radius" => {
            let params: BlastRadiusParams = serde_json::from_value(arguments)?;
            let kinds = parse_edge_kinds(params.edge_kinds.as_deref())?;
            let blast = service.query_blast_radius(&params.symbol, params.depth, kinds.as_ref())?;
            Ok(serde_json::to_value(blast)?)
        }
        "get_full_context" => {
            let params: FullContextParams = serde_json::from_value(arguments)?;
            let context =
                service.get_full_context(&params.symbol, params.include_code.unwrap_or(true))?;
            Ok(serde_json::to_value(context)?)
        }
        "find_symbols" => {
            let params: FindSymbolsParams = serde_json::from_value(arguments)?;
            let kind = parse_symbol_kind(params.symbol_type.as_deref())?;
            let found = service.find_symbols(&params.query, kind)?;
            Ok(serde_json::to_value(found)?)
        }
        "get_symbol_code" => {
            let params: SymbolCodeParams = serde_json::from_value(arguments)?;
            let code = service.get_symbol_code(&params.symbol)?;
            Ok(serde_json::to_value(code)?)
        }
        "get_file_symbols" => {
            let params: FileSymbolsParams = serde_json::from_value(arguments)?;
            let symbols = service.get_file_symbols(&params.file_path)?;
            Ok(serde_json::to_value(symbols)?)
        }
        "get_related_tests" => {
            let params: SymbolsOrFilesParams = serde_json::from_value(arguments)?;
            let tests = service.get_related_tests(
                &params.symbols.unwrap_or_default(),
                &params.files.unwrap_or_default(),
            )?;
            Ok(serde_json::to_value(tests)?)
        }
        "match_coding_rules" => {
            let params: SymbolsOrFilesParams = serde_json::from_value(arguments)?;
            let rules = service.match_coding_rules(
                &params.symbols.unwrap_or_default(),
                &params.files.unwrap_or_default(),
            );
            Ok(serde_json::to_value(rules)?)
        }
        "analyze_diff" => {
            let params: AnalyzeDiffParams = serde_json::from_value(arguments)?;
            let impact = service.analyze_diff(&params.diff, params.depth)?;
            Ok(serde_json::to_value(impact)?)
        }
        other => anyhow::bail!("unknown tool: {other}"),
    }
}

fn parse_edge_kinds(raw: Option<&[String]>) -> Result<Option<HashSet<EdgeKind>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut kinds = HashSet::new();
    for value in raw {
        let kind = EdgeKind::from_str(value).map_err(|err| anyhow::anyhow!(err))?;
        kinds.insert(kind);
    }
    if kinds.is_empty() {
        return Ok(None);
    }
    Ok(Some(kinds))
}

fn parse_symbol_kind(raw: Option<&str>) -> Result<Option<SymbolKind>> {
    match raw {
        None | Some("all") | Some("") => Ok(None),
        Some(value) => SymbolKind::from_str(value)
            .map(Some)
            .map_err(|err| anyhow::anyhow!(err)),
    }
}

fn tool_content(payload: Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    let mut result = json!({
        "content": [{ "type": "text", "text": text }],
    });
    if is_error {
        result["isError"] = json!(true);
    }
    result
}

fn jsonrpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn jsonrpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
