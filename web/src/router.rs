use crate::controller::{
    conformance_controller, health_check_controller, hello_controller, signals_controller,
    ticker_controller,
};
use axum::{routing::get, Router};
use service::AppState;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(hello_routes(app_state.clone()))
        .merge(signals_routes(app_state.clone()))
        .merge(conformance_routes(app_state.clone()))
        .merge(ticker_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn hello_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(hello_controller::index))
        .route("/hello", get(hello_controller::hello))
        .with_state(app_state)
}

fn signals_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/signals",
            get(signals_controller::echo).post(signals_controller::echo),
        )
        .with_state(app_state)
}

fn conformance_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/test",
            get(conformance_controller::run).post(conformance_controller::run),
        )
        .with_state(app_state)
}

fn ticker_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ticks", get(ticker_controller::ticks))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use axum::response::Response;
    use clap::Parser;
    use service::config::Config;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Config::parse_from(["patchstream_rs", "--hello-delay-ms", "0"]);
        define_routes(AppState::new(config))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header("datastar-request", "true")
            .body(Body::from(json.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "healthy");
    }

    #[tokio::test]
    async fn test_index_serves_demo_page() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("@get('/hello')"));
    }

    #[tokio::test]
    async fn test_hello_streams_the_message_progressively() {
        let request = Request::builder()
            .uri("/hello?datastar=%7B%22delay%22%3A0%7D")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = body_text(response).await;
        assert!(body.starts_with("retry: 1000\n\n"));
        assert_eq!(
            body.matches("event: datastar-patch-elements").count(),
            hello_controller::MESSAGE.len()
        );
        assert!(body.contains("data: elements <div id=\"message\">H</div>\n\n"));
        assert!(body.ends_with("data: elements <div id=\"message\">Hello, world!</div>\n\n"));
    }

    #[tokio::test]
    async fn test_hello_rejects_malformed_signals() {
        let request = Request::builder()
            .uri("/hello?datastar=%7Bnope")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_signals_echo_from_body() {
        let response = test_app()
            .oneshot(post_json("/signals", r#"{"x":1,"name":"ada"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "retry: 1000\n\nevent: datastar-patch-signals\ndata: signals {\"x\":1,\"name\":\"ada\"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_signals_echo_without_query_param_is_empty() {
        let request = Request::builder().uri("/signals").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .ends_with("event: datastar-patch-signals\ndata: signals {}\n\n"));
    }

    #[tokio::test]
    async fn test_signals_echo_rejects_malformed_json() {
        let response = test_app()
            .oneshot(post_json("/signals", "not-json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_conformance_batch_runs_every_known_event() {
        let batch = r##"{"events":[
            {"type":"patchElements","elements":"<div>hi</div>","selector":"#c","mode":"append"},
            {"type":"somethingElse"},
            {"type":"executeScript","script":"console.log(1)","autoRemove":false}
        ]}"##;
        let response = test_app().oneshot(post_json("/test", batch)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "retry: 1000\n\n\
             event: datastar-patch-elements\ndata: mode append\ndata: selector #c\ndata: elements <div>hi</div>\n\n\
             event: datastar-patch-elements\ndata: mode append\ndata: selector body\ndata: elements <script>console.log(1)</script>\n\n"
        );
    }

    #[tokio::test]
    async fn test_conformance_rejects_malformed_batch() {
        let response = test_app()
            .oneshot(post_json("/test", r#"{"events":"not a list"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ticker_streams_first_tick() {
        let request = Request::builder().uri("/ticks").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let mut received = String::new();
        while !received.contains("{\"ticks\":0}") {
            let chunk = futures::StreamExt::next(&mut body).await.unwrap().unwrap();
            received.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        assert!(received.starts_with("retry: 1000\n\n"));
    }
}
