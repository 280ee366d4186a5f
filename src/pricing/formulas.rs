use serde::{Deserialize, Serialize};

/// Share of requested opportunities that produced no click in either
/// period, floored at 0. Zero requests means no measurable loss.
pub fn loss_ratio(requests: u64, clicks_p1: u64, clicks_p2: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    let clicks = clicks_p1.saturating_add(clicks_p2) as f64;
    let requests = requests as f64;
    ((requests - clicks) / requests).max(0.0)
}

/// CPA × ROAS, with ROAS given in percent.
pub fn base_target_cpc(cpa: f64, roas_pct: f64) -> f64 {
    cpa * (roas_pct / 100.0)
}

/// Loss-adjusted target: CPA × ROAS × (1 + loss).
pub fn target_cpc(cpa: f64, roas_pct: f64, loss: f64) -> f64 {
    base_target_cpc(cpa, roas_pct) * (1.0 + loss)
}

/// Users who were counted as a request but never saw an ad:
/// requests × coverage − impressions, floored at 0.
pub fn user_loss(requests: u64, coverage_pct: f64, impressions: u64) -> f64 {
    (requests as f64 * (coverage_pct / 100.0) - impressions as f64).max(0.0)
}

/// Revenue over clicks inflated by the lost users. `None` when the
/// denominator is not positive.
pub fn corrected_cpc(revenue: f64, clicks: u64, user_loss: f64) -> Option<f64> {
    let denominator = clicks as f64 + user_loss;
    (denominator > 0.0).then(|| revenue / denominator)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetCpcInput {
    pub requests: u64,
    pub clicks_p1: u64,
    pub clicks_p2: u64,
    pub cpa: f64,
    pub roas_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetCpcResult {
    pub loss: f64,
    pub target_cpc: f64,
}

impl TargetCpcInput {
    pub fn compute(&self) -> TargetCpcResult {
        let loss = loss_ratio(self.requests, self.clicks_p1, self.clicks_p2);
        TargetCpcResult {
            loss,
            target_cpc: target_cpc(self.cpa, self.roas_pct, loss),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectedCpcInput {
    pub requests: u64,
    pub coverage_pct: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub revenue: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectedCpcResult {
    pub user_loss: f64,
    /// `None` when clicks plus lost users is zero.
    pub corrected_cpc: Option<f64>,
}

impl CorrectedCpcInput {
    pub fn compute(&self) -> CorrectedCpcResult {
        let lost = user_loss(self.requests, self.coverage_pct, self.impressions);
        CorrectedCpcResult {
            user_loss: lost,
            corrected_cpc: corrected_cpc(self.revenue, self.clicks, lost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn loss_and_target_cpc() {
        let r = TargetCpcInput {
            requests: 1000,
            clicks_p1: 600,
            clicks_p2: 100,
            cpa: 2.0,
            roas_pct: 70.0,
        }
        .compute();
        assert!(close(r.loss, 0.30));
        assert!(close(r.target_cpc, 1.82));
    }

    #[test]
    fn zero_requests_means_zero_loss() {
        assert_eq!(loss_ratio(0, 10, 10), 0.0);
        assert!(close(target_cpc(2.0, 70.0, loss_ratio(0, 0, 0)), 1.4));
    }

    #[test]
    fn loss_is_floored_at_zero() {
        assert_eq!(loss_ratio(100, 90, 50), 0.0);
    }

    #[test]
    fn corrected_cpc_inflates_clicks_by_lost_users() {
        let r = CorrectedCpcInput {
            requests: 500,
            coverage_pct: 80.0,
            impressions: 350,
            clicks: 40,
            revenue: 45.0,
        }
        .compute();
        assert!(close(r.user_loss, 50.0));
        assert!(close(r.corrected_cpc.unwrap(), 0.50));
    }

    #[test]
    fn over_delivery_has_no_user_loss() {
        assert_eq!(user_loss(100, 50.0, 80), 0.0);
    }

    #[test]
    fn zero_denominator_is_undefined() {
        let r = CorrectedCpcInput {
            requests: 100,
            coverage_pct: 10.0,
            impressions: 20,
            clicks: 0,
            revenue: 12.0,
        }
        .compute();
        assert_eq!(r.user_loss, 0.0);
        assert_eq!(r.corrected_cpc, None);
    }
}
