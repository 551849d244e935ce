//! A small service showing typed groups, Before-hooks and middleware.
//!
//! ```text
//! cargo run --example hello_world
//! curl localhost:8080/hello/Fox%20Mulder
//! curl -H 'X-User: scully' localhost:8080/team/blue/members
//! curl -X POST -d '_method=delete' localhost:8080/team/blue
//! ```

use std::time::Duration;

use strata::middleware::{LoggerMiddleware, MethodOverride, SlashNormalizer, TimeoutMiddleware};
use strata::{Request, Response, Router, Server, ServerConfig, StatusCode, inherit};
use tracing_subscriber::EnvFilter;

/// Top-level data, built from the raw request.
#[derive(Debug, Clone)]
struct App {
    user: Option<String>,
}

/// Data for routes that require a signed-in user.
#[derive(Debug, Clone)]
struct Member {
    user: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strata=debug")),
        )
        .init();

    let mut router = Router::new(|req: &Request| App {
        user: req.headers().get("x-user").map(str::to_owned),
    });

    router.middleware(LoggerMiddleware);
    router.middleware(SlashNormalizer);
    router.middleware(MethodOverride);
    router.middleware(TimeoutMiddleware::new(Duration::from_secs(10)));

    router.get("/", |_cx, _ctx| async { Response::ok() });

    router.get("/hello/:name", |_cx, ctx| async move {
        let name = ctx.param("name").unwrap_or("stranger").to_owned();
        Response::text(StatusCode::Ok, format!("hello {name}"))
    });

    router.sub_router("/team", inherit, |team| {
        team.before(|cx, ctx, next| async move {
            if ctx.data().user.is_none() {
                return Response::text(StatusCode::Unauthorized, "set X-User first");
            }
            next.run(cx, ctx).await
        });

        team.group(
            |app: App| Member {
                user: app.user.unwrap_or_default(),
            },
            |members| {
                members.get("/:team/members", |_cx, ctx| async move {
                    let team = ctx.param("team").unwrap_or("");
                    let body = format!("{} is on team {team}", ctx.data().user);
                    Response::text(StatusCode::Ok, body)
                });

                members.delete("/:team", |_cx, ctx| async move {
                    let team = ctx.param("team").unwrap_or("");
                    let body = format!("{} deleted team {team}", ctx.data().user);
                    Response::text(StatusCode::Ok, body)
                });
            },
        );
    });

    router.missing(|_cx, ctx| async move {
        Response::text(StatusCode::NotFound, format!("nothing at {}", ctx.path()))
    });

    let config = ServerConfig {
        request_timeout: Some(30),
        ..ServerConfig::default()
    };
    let server = Server::bind_with("127.0.0.1:8080", config).await?;
    println!("Listening on http://{}", server.local_addr());
    server.serve(router).await?;

    Ok(())
}
