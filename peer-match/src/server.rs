use crate::config::RuntimeConfig;
use crate::engine::entry::{Order, OrderSide};
use crate::engine::MatchEngine;
use crate::metrics;
use crate::peer::http_network::{ANNOUNCE_PATH, RPC_PATH};
use crate::peer::{AnnounceRequest, Envelope, HttpPeerNetwork, Peer, PeerNetwork};

use anyhow::Context;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use prometheus::{Encoder, TextEncoder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Body of `POST /createOrder`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub ticker: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(alias = "ownerId")]
    pub owner_id: String,
}

impl NewOrderRequest {
    pub fn into_order(self) -> Order {
        Order::new(self.ticker, self.side, self.price, self.quantity, self.owner_id)
    }
}

pub struct Server {
    config: RuntimeConfig,
    peer: Arc<Peer>,
    network: Arc<HttpPeerNetwork>,
    tasks: Vec<JoinHandle<()>>,
}

impl Server {
    pub fn builder(config: RuntimeConfig) -> Self {
        let network = Arc::new(HttpPeerNetwork::new(
            config.name.clone(),
            config.advertised_addr(),
            config.seeds(),
            config.peer_ttl(),
        ));
        let engine =
            MatchEngine::new(config.name.clone(), config.ticker_set()).with_lock_ttl(config.lock_ttl());
        let peer = Arc::new(Peer::new(engine, network.clone(), config.request_timeout()));
        Server {
            config,
            peer,
            network,
            tasks: Vec::new(),
        }
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.peer_addr)
            .with_context(|| format!("binding peer endpoint {}", self.config.peer_addr))?;
        let (addr, task) = serve_peer(listener, self.peer.clone(), self.network.clone())?;
        log::info!("peer {} listening for peers on {}", self.peer.name(), addr);
        self.tasks.push(task);

        let listener = TcpListener::bind(&self.config.http_addr)
            .with_context(|| format!("binding http endpoint {}", self.config.http_addr))?;
        let (addr, task) = serve_client(listener, self.peer.clone())?;
        log::info!("peer {} running http server on {}", self.peer.name(), addr);
        self.tasks.push(task);

        match self.start_metrics_server() {
            Ok(task) => self.tasks.push(task),
            Err(e) => log::error!("metrics server disabled for peer {}: {:#}", self.peer.name(), e),
        }

        // Announce right away so seeds learn about us before the first tick.
        self.network.announce().await;
        self.tasks.extend(
            self.peer
                .start_background(self.config.sweep_interval(), self.config.announce_interval()),
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        log::info!("server stop");
    }

    fn start_metrics_server(&self) -> anyhow::Result<JoinHandle<()>> {
        let addr: SocketAddr = self
            .config
            .metrics_addr
            .parse()
            .with_context(|| format!("invalid metrics address {}", self.config.metrics_addr))?;
        let make_svc = make_service_fn(move |_| {
            let registry = metrics::REGISTRY_INSTANCE.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_: Request<Body>| {
                    let registry = registry.clone();
                    async move {
                        let encoder = TextEncoder::new();
                        let metric_families = registry.gather();
                        let mut buffer = Vec::new();
                        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                            log::error!("failed to encode metrics: {}", e);
                        }
                        Ok::<_, hyper::Error>(Response::new(Body::from(buffer)))
                    }
                }))
            }
        });
        metrics::init_registry();
        let server = hyper::Server::try_bind(&addr)
            .with_context(|| format!("binding metrics endpoint {}", addr))?
            .serve(make_svc);
        log::info!("metrics server started on {}", addr);
        Ok(tokio::spawn(async move {
            if let Err(e) = server.await {
                log::error!("metrics server failed: {}", e);
            }
        }))
    }
}

/// Serves `POST /rpc` and `POST /announce` on `listener`
pub fn serve_peer(
    listener: TcpListener,
    peer: Arc<Peer>,
    network: Arc<HttpPeerNetwork>,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let make_svc = make_service_fn(move |_| {
        let peer = peer.clone();
        let network = network.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle_peer_request(peer.clone(), network.clone(), req)
            }))
        }
    });
    let server = hyper::Server::from_tcp(listener)?.serve(make_svc);
    let addr = server.local_addr();
    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            log::error!("peer endpoint failed: {}", e);
        }
    });
    Ok((addr, task))
}

/// Serves the client order API on `listener`
pub fn serve_client(
    listener: TcpListener,
    peer: Arc<Peer>,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let make_svc = make_service_fn(move |_| {
        let peer = peer.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle_client_request(peer.clone(), req)))
        }
    });
    let server = hyper::Server::from_tcp(listener)?.serve(make_svc);
    let addr = server.local_addr();
    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            log::error!("http endpoint failed: {}", e);
        }
    });
    Ok((addr, task))
}

pub async fn handle_peer_request(
    peer: Arc<Peer>,
    network: Arc<HttpPeerNetwork>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let (method, path) = (req.method().clone(), req.uri().path().to_string());
    let response = match (method, path.as_str()) {
        (Method::POST, RPC_PATH) => match read_json::<Envelope>(req).await {
            Ok(envelope) => {
                let reply = metrics::record_metrics("peer_message", || async {
                    peer.handle_message(envelope)
                })
                .await;
                json_response(StatusCode::OK, &reply)
            }
            Err(e) => {
                log::warn!("Ignoring empty or malformed payload: {}", e);
                error_response(StatusCode::BAD_REQUEST, &e)
            }
        },
        (Method::POST, ANNOUNCE_PATH) => match read_json::<AnnounceRequest>(req).await {
            Ok(announce) => {
                network.register(&announce);
                json_response(StatusCode::OK, &json!({}))
            }
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
        },
        (method, path) => {
            log::warn!("No handler for peer request {} - {}", method, path);
            empty_response(StatusCode::NOT_FOUND)
        }
    };
    Ok(response)
}

pub async fn handle_client_request(
    peer: Arc<Peer>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let (method, path) = (req.method().clone(), req.uri().path().to_string());
    let mut response = match (method, path.as_str()) {
        (Method::OPTIONS, _) => empty_response(StatusCode::NO_CONTENT),
        (Method::GET, "/getOpenOrders") => {
            json_response(StatusCode::OK, &json!({ "orders": peer.open_orders() }))
        }
        (Method::POST, "/createOrder") => match read_json::<NewOrderRequest>(req).await {
            Ok(request) => create_order(peer, request.into_order()),
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
        },
        (method, path) => {
            log::warn!("No handler for request {} - {}", method, path);
            empty_response(StatusCode::NOT_FOUND)
        }
    };
    add_cors_headers(&mut response);
    Ok(response)
}

/// Accepts the order and matches it in the background
fn create_order(peer: Arc<Peer>, order: Order) -> Response<Body> {
    if let Err(e) = peer.validate(&order) {
        log::warn!("Rejected order {}: {}", order.id, e);
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let id = order.id.clone();
    tokio::spawn(async move {
        let outcome = metrics::record_metrics("submit_order", || peer.submit_order(order)).await;
        if let Err(e) = outcome {
            log::error!("Order processing aborted: {}", e);
        }
    });
    json_response(StatusCode::ACCEPTED, &json!({ "id": id }))
}

async fn read_json<T: serde::de::DeserializeOwned>(req: Request<Body>) -> Result<T, String> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            log::error!("failed to encode response: {}", e);
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn add_cors_headers(response: &mut Response<Body>) {
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("OPTIONS, POST, GET"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert("Access-Control-Max-Age", HeaderValue::from_static("2592000"));
}
