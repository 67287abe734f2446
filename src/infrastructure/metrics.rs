// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化 Prometheus 指标导出
///
/// 监听地址无效或端口被占用时只记录警告，服务照常启动
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.listen_addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("dispatch_attempts_total", "Dispatch attempts by outcome");
    describe_counter!(
        "dispatch_success_total",
        "Tasks handed off to a worker successfully"
    );
    describe_counter!(
        "dispatch_invocation_failed_total",
        "Worker invocations that failed and were reverted"
    );
    describe_histogram!(
        "worker_invocation_duration_seconds",
        "Duration of worker invocation requests in seconds"
    );
    describe_counter!("callbacks_total", "Worker callbacks by operation and outcome");
    describe_counter!("evaluations_total", "Evaluation runs by outcome");
    describe_counter!(
        "sweep_reclaimed_tasks_total",
        "In-flight tasks reclaimed by the periodic sweep"
    );
}
