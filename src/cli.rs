//! Command tree and subcommand handlers for the `swagger-agent` binary.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use serde_json::{json, Map, Value};
use swagger_agent::{
    analysis_prompt, endpoint_selection_prompt, parameter_prompt, AgentConfig, CallOutcome,
    Catalog, EndpointSummary, PlaceholderPolicy, Plan, ResolverError, Session,
};
use tracing::{debug, warn};

pub fn build_cli() -> Command {
    let doc_arg = || {
        Arg::new("document")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("OpenAPI/Swagger JSON document ('-' for stdin)")
    };

    Command::new("swagger-agent")
        .about("Explore and call an API from its OpenAPI/Swagger description")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: $SWAGGER_AGENT_CONFIG or ./swagger-agent.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("More log output (repeatable)"),
        )
        .subcommand(
            Command::new("endpoints")
                .about("List the endpoints declared in a document")
                .arg(doc_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Show the full record of one endpoint")
                .arg(doc_arg())
                .arg(Arg::new("method").required(true).help("HTTP method"))
                .arg(Arg::new("path").required(true).help("Path template as declared")),
        )
        .subcommand(
            Command::new("call")
                .about("Call one endpoint")
                .arg(doc_arg())
                .arg(Arg::new("method").required(true).help("HTTP method"))
                .arg(Arg::new("path").required(true).help("Path template as declared"))
                .arg(
                    Arg::new("param")
                        .long("param")
                        .short('p')
                        .action(ArgAction::Append)
                        .help("Parameter value: name=value (repeatable; value parsed as JSON when possible)"),
                )
                .arg(
                    Arg::new("json-body")
                        .long("json")
                        .short('j')
                        .help("Request body as JSON string"),
                )
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .help("API base URL (overrides config)"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Timeout in seconds (overrides config)"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail when any path placeholder is left unresolved"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print the resolved request instead of sending it"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Check an intent resolver's answer against a document")
                .arg(doc_arg())
                .arg(
                    Arg::new("response")
                        .long("response")
                        .short('r')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the resolver's answer ('-' for stdin)"),
                )
                .arg(
                    Arg::new("intent")
                        .long("intent")
                        .help("Intent the answer was given for (logged only)"),
                ),
        )
        .subcommand(
            Command::new("prompt")
                .about("Render the prompt an intent resolver would be sent")
                .arg(doc_arg())
                .arg(
                    Arg::new("intent")
                        .required_unless_present("endpoint")
                        .help("What the user wants to do"),
                )
                .arg(
                    Arg::new("select")
                        .long("select")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("endpoint")
                        .help("Ask for the single best endpoint instead of a call plan"),
                )
                .arg(
                    Arg::new("endpoint")
                        .long("endpoint")
                        .num_args(2)
                        .value_names(["METHOD", "PATH"])
                        .conflicts_with("intent")
                        .help("Ask for help collecting the parameters of one endpoint"),
                ),
        )
}

pub fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(AgentConfig::default_path);
    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    match matches.subcommand() {
        Some(("endpoints", sub)) => {
            let catalog = load_catalog(sub)?;
            print_json(&catalog.summarize())?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("show", sub)) => {
            let catalog = load_catalog(sub)?;
            let endpoint = catalog.lookup(required(sub, "path")?, required(sub, "method")?)?;
            print_json(endpoint)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("call", sub)) => run_call(sub, config),
        Some(("plan", sub)) => run_plan(sub, &config),
        Some(("prompt", sub)) => run_prompt(sub),
        Some((name, _)) => bail!("unknown subcommand: {name}"),
        None => bail!("no subcommand given"),
    }
}

fn run_call(sub: &ArgMatches, mut config: AgentConfig) -> Result<ExitCode> {
    if let Some(&secs) = sub.get_one::<u64>("timeout") {
        config.timeout_secs = secs;
    }
    if sub.get_flag("strict") {
        config.placeholder_policy = PlaceholderPolicy::Strict;
    }
    let base_url = sub
        .get_one::<String>("base-url")
        .cloned()
        .or_else(|| config.base_url.clone())
        .context("no base URL: pass --base-url or set base_url in the config file")?;

    let mut session = Session::from_config(&config, base_url)?;
    let catalog = load_into(&mut session, sub)?;
    let (method, path) = (required(sub, "method")?, required(sub, "path")?);
    let endpoint = catalog.lookup(path, method)?;

    let values = parse_params(sub.get_many::<String>("param").into_iter().flatten())?;
    let body = sub
        .get_one::<String>("json-body")
        .map(|s| serde_json::from_str::<Value>(s))
        .transpose()
        .context("invalid JSON in --json argument")?;

    let missing = endpoint.missing_required(&values);
    if !missing.is_empty() {
        warn!(?missing, "required parameters not supplied");
    }

    if sub.get_flag("dry-run") {
        let req = session.client().prepare(endpoint, &values, body)?;
        print_json(&req)?;
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = session.call(method, path, &values, body)?;
    print_json(&outcome)?;
    Ok(match outcome {
        CallOutcome::Success(_) => ExitCode::SUCCESS,
        CallOutcome::Failure(_) => ExitCode::FAILURE,
    })
}

fn run_plan(sub: &ArgMatches, config: &AgentConfig) -> Result<ExitCode> {
    let response_path = sub
        .get_one::<PathBuf>("response")
        .context("--response is required")?;
    check_single_stdin(document_path(sub)?, response_path)?;

    // Planning never sends a request, so a missing base URL is fine here.
    let mut session = Session::from_config(config, config.base_url.clone().unwrap_or_default())?;
    let catalog = load_into(&mut session, sub)?;

    let answer = read_input(response_path)?;
    let recorded = |_: &[EndpointSummary], _: &str| Ok::<_, ResolverError>(answer.clone());
    let intent = sub.get_one::<String>("intent").map_or("", String::as_str);
    debug!(intent, "replaying recorded resolver answer");

    match session.plan(&recorded, intent)? {
        Plan::Calls(calls) => {
            let report: Vec<Value> = calls
                .iter()
                .map(|call| {
                    let known = call.resolve(&catalog).is_ok();
                    if !known {
                        warn!(method = %call.method, path = %call.path, "planned call not in catalog");
                    }
                    json!({
                        "method": call.method,
                        "path": call.path,
                        "reason": call.reason,
                        "known": known,
                    })
                })
                .collect();
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Plan::Raw(raw) => {
            println!("{raw}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_prompt(sub: &ArgMatches) -> Result<ExitCode> {
    let catalog = load_catalog(sub)?;

    let prompt = if let Some(mut target) = sub.get_many::<String>("endpoint") {
        let (Some(method), Some(path)) = (target.next(), target.next()) else {
            bail!("--endpoint takes METHOD and PATH");
        };
        parameter_prompt(catalog.lookup(path, method)?)
    } else {
        let intent = required(sub, "intent")?;
        if sub.get_flag("select") {
            endpoint_selection_prompt(&catalog.summarize(), intent)
        } else {
            analysis_prompt(&catalog.summarize(), intent)
        }
    };

    println!("{prompt}");
    Ok(ExitCode::SUCCESS)
}

/// Stdin can only be consumed once per run.
fn check_single_stdin(document: &Path, response: &Path) -> Result<()> {
    let stdin = Path::new("-");
    if document == stdin && response == stdin {
        bail!("the document and --response cannot both be read from stdin");
    }
    Ok(())
}

fn document_path(sub: &ArgMatches) -> Result<&PathBuf> {
    sub.get_one::<PathBuf>("document")
        .context("document argument is required")
}

fn load_into(session: &mut Session, sub: &ArgMatches) -> Result<Arc<Catalog>> {
    let path = document_path(sub)?;
    let text = read_input(path)?;
    let catalog = session
        .load_document(&text)
        .with_context(|| format!("parsing spec document {}", path.display()))?;
    debug!(path = %path.display(), endpoints = catalog.len(), "loaded catalog");
    Ok(catalog)
}

fn load_catalog(sub: &ArgMatches) -> Result<Catalog> {
    let path = document_path(sub)?;
    let text = read_input(path)?;
    let catalog = Catalog::from_json_str(&text)
        .with_context(|| format!("parsing spec document {}", path.display()))?;
    debug!(path = %path.display(), endpoints = catalog.len(), "loaded catalog");
    Ok(catalog)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn required<'a>(sub: &'a ArgMatches, id: &str) -> Result<&'a str> {
    sub.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing argument: {id}"))
}

/// `name=value` pairs into a value map; values are parsed as JSON with a
/// plain-string fallback, so `id=42` is a number and `name=rex` a string.
pub fn parse_params<'a>(pairs: impl IntoIterator<Item = &'a String>) -> Result<Map<String, Value>> {
    let mut values = Map::new();
    for pair in pairs {
        let Some((key, val)) = pair.split_once('=') else {
            bail!("invalid --param format: {pair} (expected name=value)");
        };
        if key.is_empty() {
            bail!("invalid --param format: {pair} (empty name)");
        }
        let json_val = serde_json::from_str(val).unwrap_or_else(|_| Value::String(val.to_string()));
        values.insert(key.to_string(), json_val);
    }
    Ok(values)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn parse_params_parses_json_with_string_fallback() {
        let pairs = strings(&["id=42", "name=rex the dog", "tags=[\"a\"]", "flag=true", "empty="]);
        let values = parse_params(&pairs).unwrap();

        assert_eq!(values["id"], 42);
        assert_eq!(values["name"], "rex the dog");
        assert_eq!(values["tags"], serde_json::json!(["a"]));
        assert_eq!(values["flag"], true);
        assert_eq!(values["empty"], "");
    }

    #[test]
    fn parse_params_keeps_equals_in_value() {
        let pairs = strings(&["filter=a=b"]);
        let values = parse_params(&pairs).unwrap();
        assert_eq!(values["filter"], "a=b");
    }

    #[test]
    fn parse_params_rejects_missing_equals() {
        let pairs = strings(&["no-equals-sign"]);
        let err = parse_params(&pairs).unwrap_err();
        assert!(err.to_string().contains("invalid --param format"), "got: {err}");
    }

    #[test]
    fn call_subcommand_collects_repeated_params() {
        let matches = build_cli()
            .try_get_matches_from([
                "swagger-agent",
                "call",
                "api.json",
                "GET",
                "/users/{id}",
                "-p",
                "id=1",
                "--param",
                "verbose=true",
                "--timeout",
                "5",
                "--strict",
            ])
            .unwrap();

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "call");
        let params: Vec<&String> = sub.get_many::<String>("param").unwrap().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(sub.get_one::<u64>("timeout"), Some(&5));
        assert!(sub.get_flag("strict"));
    }

    #[test]
    fn call_subcommand_rejects_zero_timeout() {
        let result = build_cli().try_get_matches_from([
            "swagger-agent",
            "call",
            "api.json",
            "GET",
            "/ping",
            "--timeout",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn prompt_subcommand_takes_intent_or_endpoint() {
        let matches = build_cli()
            .try_get_matches_from(["swagger-agent", "prompt", "api.json", "list pets", "--select"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("intent").unwrap(), "list pets");
        assert!(sub.get_flag("select"));

        let matches = build_cli()
            .try_get_matches_from([
                "swagger-agent",
                "prompt",
                "api.json",
                "--endpoint",
                "GET",
                "/pets/{id}",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let target: Vec<&String> = sub.get_many::<String>("endpoint").unwrap().collect();
        assert_eq!(target, ["GET", "/pets/{id}"]);
        assert!(sub.get_one::<String>("intent").is_none());
    }

    #[test]
    fn prompt_subcommand_needs_intent_or_endpoint() {
        let missing = build_cli().try_get_matches_from(["swagger-agent", "prompt", "api.json"]);
        assert!(missing.is_err());

        let half_endpoint = build_cli().try_get_matches_from([
            "swagger-agent",
            "prompt",
            "api.json",
            "--endpoint",
            "GET",
        ]);
        assert!(half_endpoint.is_err());

        let both = build_cli().try_get_matches_from([
            "swagger-agent",
            "prompt",
            "api.json",
            "--select",
            "--endpoint",
            "GET",
            "/pets",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn plan_rejects_stdin_for_both_inputs() {
        let err = check_single_stdin(Path::new("-"), Path::new("-")).unwrap_err();
        assert!(err.to_string().contains("cannot both be read from stdin"), "got: {err}");

        assert!(check_single_stdin(Path::new("-"), Path::new("answer.txt")).is_ok());
        assert!(check_single_stdin(Path::new("api.json"), Path::new("-")).is_ok());
    }

    #[test]
    fn global_args_work_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["swagger-agent", "endpoints", "api.json", "-vv", "-c", "x.toml"])
            .unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("x.toml"))
        );
    }
}
