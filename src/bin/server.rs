use adopspricer::{
    build_overview,
    config::{init_tracing, AppConfig},
    ingest::{parse_decimal, ProfileSet, RawReport},
    pricing::{
        analyze_block, analyze_rewarded, variation_bands, BlockAnalysisInput, CorrectedCpcInput,
        Direction, RewardedAnalysisInput, TargetCpcInput,
    },
    IngestError, OverviewRequest,
};
use anyhow::{anyhow, bail, Context, Result};
use bytes::BufMut;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, convert::Infallible, sync::Arc, time::Instant};
use tracing::{info, warn};
use warp::{
    http::StatusCode,
    multipart::FormData,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

struct AppState {
    profiles: ProfileSet,
    max_upload_bytes: u64,
}

#[derive(Serialize)]
struct Processed<T: Serialize> {
    processed_at: DateTime<Utc>,
    processing_time_seconds: f64,
    #[serde(flatten)]
    result: T,
}

#[derive(Serialize, Deserialize, Debug)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

#[derive(Deserialize)]
struct VariationRequest {
    base: f64,
    direction: Direction,
}

fn error_reply(status: StatusCode, error: &str, details: Option<String>) -> reply::Response {
    reply::with_status(
        reply::json(&ErrorResponse {
            error: error.to_string(),
            details,
        }),
        status,
    )
    .into_response()
}

fn ok_reply<T: Serialize>(result: T, start: Instant) -> reply::Response {
    reply::json(&Processed {
        processed_at: Utc::now(),
        processing_time_seconds: start.elapsed().as_secs_f64(),
        result,
    })
    .into_response()
}

fn check_non_negative(fields: &[(&str, f64)]) -> Result<()> {
    for (name, value) in fields {
        if !value.is_finite() || *value < 0.0 {
            bail!("{name} must be a non-negative number, got {value}");
        }
    }
    Ok(())
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "adops-pricer"
    })))
}

/// Reads every part of the form into memory, keyed by field name.
async fn collect_form(form: FormData) -> Result<HashMap<String, Vec<u8>>> {
    let mut fields = HashMap::new();
    let mut parts = form;
    while let Some(part) = parts.try_next().await.context("reading multipart form")? {
        let name = part.name().to_string();
        let data = part
            .stream()
            .try_fold(Vec::new(), |mut acc, buf| async move {
                acc.put(buf);
                Ok(acc)
            })
            .await
            .with_context(|| format!("reading form field {name}"))?;
        fields.insert(name, data);
    }
    Ok(fields)
}

fn number_field(fields: &HashMap<String, Vec<u8>>, name: &str) -> Result<Option<f64>> {
    let Some(raw) = fields.get(name) else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_decimal(&text)
        .map(Some)
        .ok_or_else(|| anyhow!("{name}: {text:?} is not a number"))
}

async fn run_overview(form: FormData, state: &AppState) -> Result<adopspricer::OverviewResult> {
    let mut fields = collect_form(form).await?;
    let p1 = fields.remove("p1").context("missing file field p1")?;
    let p2 = fields.remove("p2").context("missing file field p2")?;
    let cpa = number_field(&fields, "cpa")?.context("missing field cpa")?;
    let roas = number_field(&fields, "roas")?.context("missing field roas")?;
    let last_rule = number_field(&fields, "last_rule")?;
    check_non_negative(&[("cpa", cpa), ("roas", roas)])?;
    if let Some(rule) = last_rule {
        check_non_negative(&[("last_rule", rule)])?;
    }

    info!(p1_bytes = p1.len(), p2_bytes = p2.len(), cpa, roas, "overview request");
    let request = OverviewRequest {
        cpa,
        roas_pct: roas,
        last_rule,
    };
    let result = build_overview(
        &RawReport::new("P1", p1),
        &RawReport::new("P2", p2),
        &request,
        &state.profiles,
    )?;
    Ok(result)
}

async fn handle_overview(
    form: FormData,
    state: Arc<AppState>,
) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    match run_overview(form, &state).await {
        Ok(result) => {
            info!(
                "✅ overview in {:.3}s, target CPC {:.4}",
                start.elapsed().as_secs_f64(),
                result.target.target_cpc
            );
            Ok(ok_reply(result, start))
        }
        Err(e) => {
            warn!("❌ overview failed after {:.3}s: {:#}", start.elapsed().as_secs_f64(), e);
            Ok(match e.downcast_ref::<IngestError>() {
                Some(ingest) => error_reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Report could not be used",
                    Some(ingest.to_string()),
                ),
                None => error_reply(
                    StatusCode::BAD_REQUEST,
                    "Invalid request",
                    Some(format!("{:#}", e)),
                ),
            })
        }
    }
}

fn validated<T: Serialize>(
    check: Result<()>,
    start: Instant,
    compute: impl FnOnce() -> T,
) -> reply::Response {
    match check {
        Ok(()) => ok_reply(compute(), start),
        Err(e) => error_reply(StatusCode::BAD_REQUEST, "Invalid request", Some(e.to_string())),
    }
}

async fn handle_target_cpc(req: TargetCpcInput) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    let check = check_non_negative(&[("cpa", req.cpa), ("roas_pct", req.roas_pct)]);
    Ok(validated(check, start, || req.compute()))
}

async fn handle_corrected_cpc(req: CorrectedCpcInput) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    let check = check_non_negative(&[
        ("coverage_pct", req.coverage_pct),
        ("revenue", req.revenue),
    ]);
    Ok(validated(check, start, || req.compute()))
}

async fn handle_block(req: BlockAnalysisInput) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    let check = check_non_negative(&[
        ("cpc", req.cpc),
        ("coverage_pct", req.coverage_pct),
        ("last_rule", req.last_rule),
        ("cpa", req.cpa),
        ("roas_pct", req.roas_pct),
    ]);
    Ok(validated(check, start, || analyze_block(&req)))
}

async fn handle_rewarded(req: RewardedAnalysisInput) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    let check = check_non_negative(&[
        ("coverage_pct", req.coverage_pct),
        ("revenue", req.revenue),
        ("last_rule", req.last_rule),
        ("cpa", req.cpa),
        ("roas_pct", req.roas_pct),
        ("mob_top_cpc", req.mob_top_cpc),
    ]);
    Ok(validated(check, start, || analyze_rewarded(&req)))
}

async fn handle_variation(req: VariationRequest) -> Result<reply::Response, Infallible> {
    let start = Instant::now();
    let check = check_non_negative(&[("base", req.base)]);
    Ok(validated(check, start, || {
        serde_json::json!({ "bands": variation_bands(req.base, req.direction) })
    }))
}

async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let (status, error) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Upload too large")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid JSON body")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        (StatusCode::BAD_REQUEST, "Invalid request")
    };
    Ok(error_reply(status, error, Some(format!("{:?}", err))))
}

fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_upload = state.max_upload_bytes;
    let with_state = warp::any().map(move || state.clone());

    let health = warp::path("health").and(warp::get()).and_then(health_check);

    let overview = warp::path!("overview")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload))
        .and(with_state)
        .and_then(handle_overview);

    let target = warp::path!("pricing" / "target-cpc")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_target_cpc);
    let corrected = warp::path!("pricing" / "corrected-cpc")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_corrected_cpc);
    let block = warp::path!("pricing" / "block")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_block);
    let rewarded = warp::path!("pricing" / "rewarded")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_rewarded);
    let variation = warp::path!("variation")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_variation);

    health
        .or(overview)
        .or(target)
        .or(corrected)
        .or(block)
        .or(rewarded)
        .or(variation)
        .recover(handle_rejection)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting ad-ops pricing service");
    let state = Arc::new(AppState {
        profiles: config.profiles()?,
        max_upload_bytes: config.max_upload_bytes,
    });

    let port = config.port;
    info!("Server starting on port {}", port);
    info!("Health check: http://localhost:{}/health", port);
    info!("Overview endpoint: POST http://localhost:{}/overview", port);

    warp::serve(routes(state)).run(([0, 0, 0, 0], port)).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const P1_CSV: &str = "Relatório P1\n\
Bloco de anúncios;Solicitações de anúncios;Cliques do Ad Exchange;CTR do Ad Exchange;Taxa de correspondência;CPC do Ad Exchange\n\
app_interstitial;1.000;500;12,00%;85,00%;US$ 2,00\n\
mob_top_home;4.000;80;2,00%;35,00%;US$ 0,30\n\
Total;5.000;600;3,00%;50,00%;US$ 1,70\n";

    const P2_CSV: &str = "Bloco de anúncios;Solicitações de anúncios;Cliques do Ad Exchange;Impressões do Ad Exchange;Taxa de correspondência;Receita do Ad Exchange;CPC do Ad Exchange\n\
mob_top_home;3.000;90;2.500;90,00%;US$ 54,00;US$ 0,60\n\
rewarded_video;500;40;350;80,00%;US$ 45,00;US$ 1,12\n";

    const BOUNDARY: &str = "adops-test-boundary";

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            profiles: ProfileSet::default(),
            max_upload_bytes: 1024 * 1024,
        })
    }

    fn multipart_body(fields: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = String::new();
        for (name, filename, value) in fields {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body.into_bytes()
    }

    async fn post_overview(fields: &[(&str, Option<&str>, &str)]) -> (StatusCode, Value) {
        let resp = warp::test::request()
            .method("POST")
            .path("/overview")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(fields))
            .reply(&routes(state()))
            .await;
        let body: Value = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
        (resp.status(), body)
    }

    async fn post_json(path: &str, body: Value) -> (StatusCode, Value) {
        let resp = warp::test::request()
            .method("POST")
            .path(path)
            .json(&body)
            .reply(&routes(state()))
            .await;
        let body: Value = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
        (resp.status(), body)
    }

    #[tokio::test]
    async fn test_health_check() {
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_overview_upload() {
        let (status, body) = post_overview(&[
            ("p1", Some("p1.csv"), P1_CSV),
            ("p2", Some("p2.csv"), P2_CSV),
            ("cpa", None, "2,00"),
            ("roas", None, "70"),
            ("last_rule", None, "1.0"),
        ])
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["processed_at"].is_string());
        let loss = body["target"]["loss"].as_f64().unwrap();
        assert!((loss - 0.27).abs() < 1e-9);
        let corrected = body["corrected"]["corrected_cpc"].as_f64().unwrap();
        assert!((corrected - 0.5).abs() < 1e-9);
        assert_eq!(body["recommendations"][1]["action"], "increase");
        assert_eq!(body["recommendations"][1]["bands"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overview_missing_columns_is_unprocessable() {
        let p1 = P1_CSV.replace("CPC do Ad Exchange", "Custo");
        let (status, body) = post_overview(&[
            ("p1", Some("p1.csv"), p1.as_str()),
            ("p2", Some("p2.csv"), P2_CSV),
            ("cpa", None, "2"),
            ("roas", None, "70"),
        ])
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"], "P1: missing columns: cpc");
    }

    #[tokio::test]
    async fn test_overview_missing_field_is_bad_request() {
        let (status, body) = post_overview(&[
            ("p1", Some("p1.csv"), P1_CSV),
            ("cpa", None, "2"),
            ("roas", None, "70"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("p2"));
    }

    #[tokio::test]
    async fn test_target_cpc_route() {
        let (status, body) = post_json(
            "/pricing/target-cpc",
            json!({"requests": 1000, "clicks_p1": 600, "clicks_p2": 100, "cpa": 2.0, "roas_pct": 70.0}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["loss"].as_f64().unwrap() - 0.30).abs() < 1e-9);
        assert!((body["target_cpc"].as_f64().unwrap() - 1.82).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_corrected_cpc_zero_denominator_is_null() {
        let (status, body) = post_json(
            "/pricing/corrected-cpc",
            json!({"requests": 0, "coverage_pct": 80.0, "impressions": 0, "clicks": 0, "revenue": 10.0}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["corrected_cpc"].is_null());
    }

    #[tokio::test]
    async fn test_block_route_rejects_negative_input() {
        let (status, body) = post_json(
            "/pricing/block",
            json!({"block": "mob_top", "cpc": -0.1, "coverage_pct": 50.0, "last_rule": 1.0, "cpa": 1.0, "roas_pct": 70.0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("cpc"));
    }

    #[tokio::test]
    async fn test_rewarded_route() {
        let (status, body) = post_json(
            "/pricing/rewarded",
            json!({
                "requests": 500, "impressions": 350, "clicks": 40, "coverage_pct": 80.0,
                "revenue": 45.0, "last_rule": 1.0, "cpa": 2.0, "roas_pct": 70.0, "mob_top_cpc": 0.6
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_loss"], 50);
        assert_eq!(body["action"], "increase");
    }

    #[tokio::test]
    async fn test_variation_route() {
        let (status, body) =
            post_json("/variation", json!({"base": 1.0, "direction": "decrease"})).await;
        assert_eq!(status, StatusCode::OK);
        let bands = body["bands"].as_array().unwrap();
        assert_eq!(bands.len(), 3);
        assert!((bands[0]["low"].as_f64().unwrap() - 0.90).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let resp = warp::test::request()
            .method("POST")
            .path("/pricing/target-cpc")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
