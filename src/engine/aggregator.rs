use super::weights::WeightConfig;
use super::round2;
use crate::models::{Action, Leaning, Recommendation, TimeframeBundle};

/// Weighted vote across timeframe bundles
///
/// Each buy-leaning result adds `timeframe_weight * indicator_weight` to the
/// buy side, each sell-leaning result to the sell side. The larger side wins;
/// an exact tie (including nothing at all) is Hold.
pub fn aggregate(bundles: &[TimeframeBundle], weights: &WeightConfig) -> Recommendation {
    let mut buy_weight = 0.0;
    let mut sell_weight = 0.0;

    for bundle in bundles {
        if !weights.has_timeframe(bundle.timeframe) {
            tracing::debug!(timeframe = %bundle.timeframe, "No weight for timeframe, votes ignored");
        }
        let tf_weight = weights.timeframe_weight(bundle.timeframe);

        for result in bundle.iter() {
            let Some(leaning) = result.signal.leaning() else {
                continue;
            };

            if !weights.has_indicator(&result.indicator_name) {
                tracing::debug!(
                    timeframe = %bundle.timeframe,
                    indicator = %result.indicator_name,
                    "No weight for indicator, vote ignored"
                );
            }
            let vote = tf_weight * weights.indicator_weight(&result.indicator_name);

            match leaning {
                Leaning::Buy => buy_weight += vote,
                Leaning::Sell => sell_weight += vote,
            }
        }
    }

    let total = buy_weight + sell_weight;
    let (action, winning) = if buy_weight > sell_weight {
        (Action::Buy, buy_weight)
    } else if sell_weight > buy_weight {
        (Action::Sell, sell_weight)
    } else {
        (Action::Hold, buy_weight)
    };

    let confidence = if total > 0.0 {
        round2(winning / total * 100.0)
    } else {
        0.0
    };

    tracing::debug!(buy_weight, sell_weight, ?action, confidence, "Votes aggregated");

    Recommendation {
        action,
        confidence,
        buy_weight,
        sell_weight,
    }
}
