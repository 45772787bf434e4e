//! Post-run statistics.
//!
//! Times are in simulation minutes. Order-level figures cover delivered orders only;
//! resource-level figures cover every finished visit, including those of orders that
//! were still travelling when the run ended.

use std::path::Path;

use depot_core::{Resource, SimTime};
use depot_metrics::{
    export_json, LatencyStats, LatencySummary, SeriesSummary, TimeSeriesPoint,
    TimeWeightedSeries,
};
use serde::Serialize;

use crate::config::WarehouseConfig;
use crate::delivery::DeliveryRecord;
use crate::error::WarehouseError;
use crate::order::OrderRecord;
use crate::sector::SectorVisit;

/// Statistics of one resource (a sector's employees or the trucks).
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: String,
    pub capacity: usize,
    pub waiting_time: LatencyStats,
    pub processing_time: LatencyStats,
    pub total_time: LatencyStats,
    pub queue_size: Option<SeriesSummary>,
    pub utilization: Option<SeriesSummary>,
    pub queue_size_over_time: Vec<TimeSeriesPoint>,
    pub utilization_over_time: Vec<TimeSeriesPoint>,
}

impl ResourceReport {
    /// `stays` holds (waiting, processing) per finished visit.
    fn build(
        resource: &Resource,
        stays: impl IntoIterator<Item = (f64, f64)>,
        end: SimTime,
    ) -> Result<Self, WarehouseError> {
        let mut waiting = LatencySummary::new()?;
        let mut processing = LatencySummary::new()?;
        let mut total = LatencySummary::new()?;
        for (wait, work) in stays {
            waiting.record(wait)?;
            processing.record(work)?;
            total.record(wait + work)?;
        }

        let history = resource.history();
        let queue_size = TimeWeightedSeries::queue_size(&history);
        let utilization = TimeWeightedSeries::utilization(&history, resource.capacity());
        Ok(Self {
            name: resource.name(),
            capacity: resource.capacity(),
            waiting_time: waiting.stats(),
            processing_time: processing.stats(),
            total_time: total.stats(),
            queue_size: queue_size.summary(end),
            utilization: utilization.summary(end),
            queue_size_over_time: queue_size.points().to_vec(),
            utilization_over_time: utilization.points().to_vec(),
        })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseReport {
    pub config: WarehouseConfig,
    pub final_time: SimTime,
    pub orders_created: usize,
    pub orders_delivered: usize,
    /// Orders still in the warehouse or on the road when the run ended.
    pub orders_not_delivered: Vec<String>,
    pub total_time: LatencyStats,
    pub waiting_time: LatencyStats,
    pub processing_time: LatencyStats,
    pub resources: Vec<ResourceReport>,
    pub orders: Vec<OrderRecord>,
}

/// Inputs of [`WarehouseReport::build`].
pub struct RunOutcome<'a> {
    pub config: &'a WarehouseConfig,
    pub final_time: SimTime,
    pub orders: Vec<OrderRecord>,
    /// Employees of each sector, indexed by sector id.
    pub sector_employees: Vec<&'a Resource>,
    pub visits: Vec<SectorVisit>,
    pub trucks: &'a Resource,
    pub deliveries: Vec<DeliveryRecord>,
}

impl WarehouseReport {
    pub fn build(outcome: RunOutcome<'_>) -> Result<Self, WarehouseError> {
        let RunOutcome {
            config,
            final_time,
            orders,
            sector_employees,
            visits,
            trucks,
            deliveries,
        } = outcome;

        let mut total = LatencySummary::new()?;
        let mut waiting = LatencySummary::new()?;
        let mut processing = LatencySummary::new()?;
        let mut orders_not_delivered = Vec::new();
        for order in &orders {
            match (order.total_time(), order.waiting_time(), order.processing_time()) {
                (Some(t), Some(w), Some(p)) => {
                    total.record(t)?;
                    waiting.record(w)?;
                    processing.record(p)?;
                }
                _ => orders_not_delivered.push(order.name.clone()),
            }
        }

        let mut resources = sector_employees
            .iter()
            .enumerate()
            .map(|(sector, employees)| {
                let stays = visits
                    .iter()
                    .filter(|visit| visit.sector == sector)
                    .map(|visit| (visit.waiting_time(), visit.processing_time()));
                ResourceReport::build(employees, stays, final_time)
            })
            .collect::<Result<Vec<_>, WarehouseError>>()?;
        let trips = deliveries
            .iter()
            .map(|delivery| (delivery.waiting_time(), delivery.delivery_time()));
        resources.push(ResourceReport::build(trucks, trips, final_time)?);

        Ok(Self {
            config: config.clone(),
            final_time,
            orders_created: orders.len(),
            orders_delivered: orders.len() - orders_not_delivered.len(),
            orders_not_delivered,
            total_time: total.stats(),
            waiting_time: waiting.stats(),
            processing_time: processing.stats(),
            resources,
            orders,
        })
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    /// Write the report as JSON.
    pub fn export_json(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), WarehouseError> {
        export_json(self, path, pretty)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::Environment;

    fn at(t: f64) -> SimTime {
        SimTime::from(t)
    }

    #[test]
    fn test_report_splits_delivered_and_pending_orders() {
        let env = Environment::new();
        let employees = Resource::new(&env, "Sector 0 employees", 1).unwrap();
        let trucks = Resource::new(&env, "Delivery trucks", 1).unwrap();

        let visit = SectorVisit {
            order: "Order 0".to_string(),
            sector: 0,
            arrived_at: at(1.0),
            started_at: at(1.0),
            finished_at: at(11.0),
        };
        let delivery = DeliveryRecord {
            order: "Order 0".to_string(),
            requested_at: at(11.0),
            dispatched_at: at(12.0),
            delivered_at: at(32.0),
        };
        let mut delivered = OrderRecord::new(0, "Order 0", vec![0], at(1.0));
        delivered.prepared_at = Some(at(11.0));
        delivered.delivered_at = Some(at(32.0));
        delivered.visits = vec![visit.clone()];
        delivered.delivery = Some(delivery.clone());
        let pending = OrderRecord::new(1, "Order 1", vec![0], at(6.0));

        let config = WarehouseConfig::default();
        let report = WarehouseReport::build(RunOutcome {
            config: &config,
            final_time: at(40.0),
            orders: vec![delivered, pending],
            sector_employees: vec![&employees],
            visits: vec![visit],
            trucks: &trucks,
            deliveries: vec![delivery],
        })
        .unwrap();

        assert_eq!(report.orders_created, 2);
        assert_eq!(report.orders_delivered, 1);
        assert_eq!(report.orders_not_delivered, vec!["Order 1".to_string()]);
        assert_eq!(report.total_time.mean, 31.0);
        assert_eq!(report.waiting_time.mean, 1.0);
        assert_eq!(report.processing_time.mean, 30.0);

        let trucks = report.resource("Delivery trucks").unwrap();
        assert_eq!(trucks.waiting_time.mean, 1.0);
        assert_eq!(trucks.total_time.mean, 21.0);
        let sector = report.resource("Sector 0 employees").unwrap();
        assert_eq!(sector.processing_time.count, 1);
        assert_eq!(report.resources.len(), 2);

        let json = depot_metrics::to_json_string(&report, false).unwrap();
        assert!(json.contains("\"orders_not_delivered\":[\"Order 1\"]"));
    }
}
