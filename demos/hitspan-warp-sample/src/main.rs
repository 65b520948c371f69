use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use hitspan::{listener, with_counter, Config, HitCounter, ListenerOptions};
use serde::Serialize;
use slog::{info, o, Drain};
use structopt::StructOpt;
use warp::http::StatusCode;
use warp::{reply, Filter};

#[derive(Debug, StructOpt)]
struct Options {
    #[structopt(long, default_value = "0.0.0.0:3000")]
    web_server: String,
    /// Widest supported query window, seconds.
    #[structopt(long, default_value = "400")]
    max_timespan: u64,
    /// Staleness tolerance before a trim pass, seconds.
    #[structopt(long, default_value = "60")]
    clean_frequency: u64,
}

#[derive(Serialize)]
struct Envelope {
    code: u16,
    message: String,
}

fn envelope(code: StatusCode, message: impl Into<String>) -> impl warp::Reply {
    let body = Envelope {
        code: code.as_u16(),
        message: message.into(),
    };
    reply::with_status(reply::json(&body), code)
}

async fn hits(
    counter: HitCounter,
    query: HashMap<String, String>,
) -> Result<impl warp::Reply, Infallible> {
    let seconds = query.get("seconds").map(String::as_str);
    let tag = query.get("tag").map(String::as_str);
    Ok(match counter.query_param(seconds, tag) {
        Ok(count) => envelope(StatusCode::OK, count.to_string()),
        Err(e) => envelope(StatusCode::BAD_REQUEST, e.to_string()),
    })
}

async fn clear(counter: HitCounter) -> Result<impl warp::Reply, Infallible> {
    counter.clear();
    Ok(envelope(StatusCode::OK, "The hits have been cleared"))
}

async fn status(counter: HitCounter) -> Result<impl warp::Reply, Infallible> {
    Ok(reply::json(&counter.status()))
}

// curl "http://127.0.0.1:3000/v1/app"
// curl "http://127.0.0.1:3000/api/hits?seconds=60"
// curl "http://127.0.0.1:3000/api/hits?seconds=60&tag=/v1/app"
// curl -X DELETE "http://127.0.0.1:3000/api/hits"

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")));

    // converts log to slog
    let _scope_guard = slog_scope::set_global_logger(logger.clone());
    let _log_guard = slog_stdlog::init()?;

    let options = Options::from_args();
    let cfg = Config {
        max_timespan: Duration::from_secs(options.max_timespan),
        clean_frequency: Duration::from_secs(options.clean_frequency),
        ..Default::default()
    };
    let counter = HitCounter::new(cfg, logger.clone());

    // count only the two app routes
    let track = listener(
        counter.clone(),
        ListenerOptions::for_paths(["/v1/app", "/v2/app"]),
    );

    let v1 = warp::get()
        .and(warp::path!("v1" / "app"))
        .map(|| envelope(StatusCode::OK, "The app v1 has been served"));

    let v2 = warp::get()
        .and(warp::path!("v2" / "app"))
        .map(|| envelope(StatusCode::OK, "The app v2 has been served"));

    let data = warp::get()
        .and(warp::path!("api" / "data"))
        .map(|| envelope(StatusCode::OK, "This request is not a hit"));

    let get_hits = warp::get()
        .and(warp::path!("api" / "hits"))
        .and(with_counter(counter.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and_then(hits);

    let delete_hits = warp::delete()
        .and(warp::path!("api" / "hits"))
        .and(with_counter(counter.clone()))
        .and_then(clear);

    let get_status = warp::get()
        .and(warp::path!("api" / "status"))
        .and(with_counter(counter.clone()))
        .and_then(status);

    let not_found = warp::any().map(|| envelope(StatusCode::NOT_FOUND, "Not Found"));

    let routes = track.and(
        v1.or(v2)
            .or(data)
            .or(get_hits)
            .or(delete_hits)
            .or(get_status)
            .or(not_found),
    );

    let addr = SocketAddr::from_str(&options.web_server)?;
    info!(logger, "sample server listening"; "addr" => %addr);
    warp::serve(routes).run(addr).await;
    Ok(())
}
