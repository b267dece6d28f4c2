use rust_decimal::Decimal;
use tranche_core::{Price, Quantity, Side, SymbolFilters, ValidationError, ValidationResult};

use super::level::GridLevel;

/// Computes the static price ladder of a grid
pub struct GridPlanner;

impl GridPlanner {
    /// Evenly spaced levels from `lower` to `upper` inclusive
    ///
    /// `step = (upper - lower) / (level_count - 1)`. Both bounds must sit on
    /// the tick grid; intermediate prices are rounded to the nearest tick and
    /// the last level is exactly `upper`. A step too fine to give distinct
    /// ticks is rejected. Pure and deterministic: identical inputs give
    /// identical ladders.
    pub fn build_levels(
        lower: Price,
        upper: Price,
        level_count: usize,
        quantity_per_level: Quantity,
        filters: &SymbolFilters,
    ) -> ValidationResult<Vec<GridLevel>> {
        let tick_size = filters.tick_size;
        if lower <= Decimal::ZERO {
            return Err(ValidationError::PriceTooSmall {
                price: lower,
                min: tick_size,
            });
        }
        if lower >= upper {
            return Err(ValidationError::InvalidRange { lower, upper });
        }
        if level_count < 2 {
            return Err(ValidationError::InvalidLevelCount(level_count));
        }
        for bound in [lower, upper] {
            if !filters.is_price_aligned(bound) {
                return Err(ValidationError::PriceNotAligned {
                    price: bound,
                    tick: tick_size,
                });
            }
        }

        let step = (upper - lower) / Decimal::from(level_count - 1);
        if step < tick_size {
            return Err(ValidationError::GridStepTooSmall {
                step,
                tick: tick_size,
            });
        }

        let levels: Vec<GridLevel> = (0..level_count)
            .map(|i| {
                let price = if i + 1 == level_count {
                    upper
                } else {
                    filters.round_price(lower + step * Decimal::from(i))
                };
                GridLevel::new(i, price.normalize(), quantity_per_level)
            })
            .collect();
        if levels.windows(2).any(|w| w[0].price >= w[1].price) {
            return Err(ValidationError::GridStepTooSmall {
                step,
                tick: tick_size,
            });
        }
        Ok(levels)
    }

    /// Levels strictly below `market_price` buy, the rest sell
    pub fn assign_sides(levels: &mut [GridLevel], market_price: Price) {
        for level in levels.iter_mut() {
            level.side = Some(Self::side_for(level.price, market_price));
        }
    }

    pub fn side_for(price: Price, market_price: Price) -> Side {
        if price < market_price {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cents() -> SymbolFilters {
        SymbolFilters::default()
    }

    #[test]
    fn test_ten_level_ladder() {
        let mut levels =
            GridPlanner::build_levels(dec!(44000), dec!(46000), 10, dec!(0.01), &cents()).unwrap();

        let prices: Vec<Price> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices.len(), 10);
        assert_eq!(prices[0], dec!(44000));
        assert_eq!(prices[1], dec!(44222.22));
        assert_eq!(prices[2], dec!(44444.44));
        assert_eq!(prices[3], dec!(44666.67));
        assert_eq!(prices[9], dec!(46000));
        assert!(prices.windows(2).all(|w| w[0] < w[1]));

        GridPlanner::assign_sides(&mut levels, dec!(45000));
        for level in &levels {
            let expected = if level.price < dec!(45000) { Side::Buy } else { Side::Sell };
            assert_eq!(level.side, Some(expected));
        }
        assert_eq!(levels[4].side, Some(Side::Buy));
        assert_eq!(levels[5].side, Some(Side::Sell));
    }

    #[test]
    fn test_build_is_idempotent() {
        let a = GridPlanner::build_levels(dec!(2500), dec!(3500), 7, dec!(0.1), &cents()).unwrap();
        let b = GridPlanner::build_levels(dec!(2500), dec!(3500), 7, dec!(0.1), &cents()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_level_at_market_sells() {
        let mut levels =
            GridPlanner::build_levels(dec!(100), dec!(200), 3, dec!(1), &cents()).unwrap();
        GridPlanner::assign_sides(&mut levels, dec!(150));
        assert_eq!(levels[1].price, dec!(150));
        assert_eq!(levels[1].side, Some(Side::Sell));
    }

    #[test]
    fn test_invalid_ladders() {
        assert_eq!(
            GridPlanner::build_levels(dec!(46000), dec!(44000), 10, dec!(0.01), &cents()),
            Err(ValidationError::InvalidRange {
                lower: dec!(46000),
                upper: dec!(44000)
            })
        );
        assert_eq!(
            GridPlanner::build_levels(dec!(44000), dec!(46000), 1, dec!(0.01), &cents()),
            Err(ValidationError::InvalidLevelCount(1))
        );
        assert!(matches!(
            GridPlanner::build_levels(dec!(100), dec!(100.05), 10, dec!(1), &cents()),
            Err(ValidationError::GridStepTooSmall { .. })
        ));
    }

    #[test]
    fn test_off_tick_bounds_rejected() {
        assert_eq!(
            GridPlanner::build_levels(dec!(100.015), dec!(100.035), 3, dec!(1), &cents()),
            Err(ValidationError::PriceNotAligned {
                price: dec!(100.015),
                tick: dec!(0.01)
            })
        );
        assert_eq!(
            GridPlanner::build_levels(dec!(100.01), dec!(100.035), 3, dec!(1), &cents()),
            Err(ValidationError::PriceNotAligned {
                price: dec!(100.035),
                tick: dec!(0.01)
            })
        );
    }

    #[test]
    fn test_every_level_on_a_coarse_tick() {
        let half = SymbolFilters::new(dec!(0.5), dec!(0.001), dec!(0.001), dec!(0.5));
        let levels =
            GridPlanner::build_levels(dec!(100), dec!(101.5), 3, dec!(1), &half).unwrap();
        let prices: Vec<Price> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(100), dec!(101), dec!(101.5)]);

        let tenth = SymbolFilters::new(dec!(0.1), dec!(0.001), dec!(0.001), dec!(0.1));
        let levels =
            GridPlanner::build_levels(dec!(44000), dec!(46000), 10, dec!(0.01), &tenth).unwrap();
        assert!(levels.iter().all(|l| tenth.is_price_aligned(l.price)));
        assert!(levels.windows(2).all(|w| w[0].price < w[1].price));
        assert_eq!(levels[1].price, dec!(44222.2));
    }

    #[test]
    fn test_step_of_one_tick_gives_every_tick() {
        let levels =
            GridPlanner::build_levels(dec!(100), dec!(100.04), 5, dec!(1), &cents()).unwrap();
        let prices: Vec<Price> = levels.iter().map(|l| l.price).collect();
        assert_eq!(
            prices,
            vec![dec!(100), dec!(100.01), dec!(100.02), dec!(100.03), dec!(100.04)]
        );
    }
}
