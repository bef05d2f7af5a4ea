use warp::Filter;

/// A plain liveness/readiness probe: `GET /healthz` always returns 200 while
/// the process is up. Kubernetes-style probes don't need more than that here
/// since there is no external dependency (database, queue) whose health
/// would need separate reporting.
pub fn route() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("healthz").and(warp::get()).map(|| "ok")
}
