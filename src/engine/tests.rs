//! Tests for the alert engine

#[cfg(test)]
mod tests {
    use super::super::render::{format_generated_at, format_usd, render_message};
    use super::super::*;
    use crate::config::EngineConfig;
    use crate::error::AlertError;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn engine() -> AlertEngine {
        AlertEngine::new(EngineConfig::default()).unwrap()
    }

    fn generated_at() -> chrono::DateTime<Utc> {
        // 2024-06-15 09:00:00 KST
        Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
    }

    fn batch(today: i64, yesterday: i64) -> RawBatch {
        RawBatch {
            readings: vec![
                RawReading::new(today.to_string(), Sentiment::from_value(today).label(), "1718409600"),
                RawReading::new(yesterday.to_string(), Sentiment::from_value(yesterday).label(), "1718323200"),
            ],
            market_context: None,
        }
    }

    // ---------------------------------------------------------------------
    // Ingestion
    // ---------------------------------------------------------------------

    #[test]
    fn test_ingest_orders_today_first() {
        let ingested = ingest(&batch(40, 55), &EngineConfig::default()).unwrap();
        assert_eq!(ingested.today.value, 40);
        assert_eq!(ingested.yesterday.value, 55);
        assert!(ingested.warnings.is_empty());
    }

    #[test]
    fn test_ingest_ignores_extra_readings() {
        let mut raw = batch(40, 55);
        raw.readings.push(RawReading::new("99", "Extreme Greed", "1718236800"));
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.yesterday.value, 55);
    }

    #[test]
    fn test_ingest_rejects_single_reading() {
        let mut raw = batch(40, 55);
        raw.readings.truncate(1);
        let err = ingest(&raw, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AlertError::InsufficientData { received: 1 }));
        assert!(err.to_string().contains("got 1"));
    }

    #[test]
    fn test_ingest_rejects_empty_batch() {
        let err = ingest(&RawBatch::default(), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AlertError::InsufficientData { received: 0 }));
    }

    #[test]
    fn test_malformed_value_defaults_to_fallback() {
        let raw = RawBatch {
            readings: vec![
                RawReading::new("abc", "Fear", "1718409600"),
                RawReading::new(30, "Fear", 1718323200),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.today.value, 0);
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.warnings[0].field, "value");
        assert_eq!(ingested.warnings[0].kind, WarningKind::Unparseable);
        assert_eq!(ingested.warnings[0].reading, 0);
    }

    #[test]
    fn test_custom_fallback_is_used() {
        let config = EngineConfig {
            fallback_integer_default: 50,
            ..EngineConfig::default()
        };
        let raw = RawBatch {
            readings: vec![
                RawReading::new(json!(null), "Neutral", "1718409600"),
                RawReading::new("50", "Neutral", "1718323200"),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &config).unwrap();
        assert_eq!(ingested.today.value, 50);
        assert_eq!(ingested.warnings[0].substituted, Some(50));
    }

    #[test]
    fn test_strict_int_parsing() {
        use super::super::ingest::parse_strict_int;

        assert_eq!(parse_strict_int(&json!(42)), Some(42));
        assert_eq!(parse_strict_int(&json!("42")), Some(42));
        assert_eq!(parse_strict_int(&json!(" 42 ")), Some(42));
        assert_eq!(parse_strict_int(&json!(42.0)), Some(42));
        assert_eq!(parse_strict_int(&json!("-7")), Some(-7));
        assert_eq!(parse_strict_int(&json!("42abc")), None);
        assert_eq!(parse_strict_int(&json!("12.5")), None);
        assert_eq!(parse_strict_int(&json!(12.5)), None);
        assert_eq!(parse_strict_int(&json!("")), None);
        assert_eq!(parse_strict_int(&json!(true)), None);
        assert_eq!(parse_strict_int(&json!(null)), None);
    }

    #[test]
    fn test_out_of_range_value_is_clamped() {
        let raw = RawBatch {
            readings: vec![
                RawReading::new(140, "Extreme Greed", 1718409600),
                RawReading::new(-3, "Extreme Fear", 1718323200),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.today.value, 100);
        assert_eq!(ingested.yesterday.value, 0);
        assert_eq!(ingested.warnings.len(), 2);
        assert!(ingested.warnings.iter().all(|w| w.kind == WarningKind::OutOfRange));
    }

    #[test]
    fn test_missing_classification_is_unknown() {
        let raw = RawBatch {
            readings: vec![
                RawReading {
                    value: json!("45"),
                    value_classification: None,
                    timestamp: json!("1718409600"),
                },
                RawReading::new("50", "Neutral", "1718323200"),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.today.classification, "Unknown");
    }

    #[test]
    fn test_timestamp_string_and_number_agree() {
        let config = EngineConfig::default();
        let mut warnings = Vec::new();
        let from_string = super::super::ingest::coerce_reading(
            &RawReading::new(1, "x", "1718409600"),
            0,
            &config,
            &mut warnings,
        );
        let from_number = super::super::ingest::coerce_reading(
            &RawReading::new(1, "x", 1718409600),
            0,
            &config,
            &mut warnings,
        );
        assert_eq!(from_string.timestamp, from_number.timestamp);
        assert_eq!(from_string.timestamp_iso(), "2024-06-15T00:00:00.000Z");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_timestamp_conversion_32bit_bounds() {
        use super::super::ingest::epoch_to_utc;
        use super::super::types::to_iso;

        assert_eq!(to_iso(epoch_to_utc(0).unwrap()), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            to_iso(epoch_to_utc(i32::MAX as i64).unwrap()),
            "2038-01-19T03:14:07.000Z"
        );
        assert_eq!(
            to_iso(epoch_to_utc(i32::MIN as i64).unwrap()),
            "1901-12-13T20:45:52.000Z"
        );
    }

    #[test]
    fn test_malformed_timestamp_falls_back_to_epoch() {
        let raw = RawBatch {
            readings: vec![
                RawReading::new("45", "Fear", "yesterday"),
                RawReading::new("50", "Neutral", "1718323200"),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.today.timestamp_iso(), "1970-01-01T00:00:00.000Z");
        assert_eq!(ingested.warnings[0].field, "timestamp");
    }

    #[test]
    fn test_context_normalization() {
        let mut raw = batch(45, 50);
        raw.market_context = Some(MarketContext {
            btc_price: Some(dec!(0)),
            eth_price: Some(dec!(3500.25)),
            commentary: Some("   ".to_string()),
        }.into());
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.context.btc_price, None);
        assert_eq!(ingested.context.eth_price, Some(dec!(3500.25)));
        assert_eq!(ingested.context.commentary, None);
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.warnings[0].field, "btcPrice");
        assert_eq!(ingested.warnings[0].kind, WarningKind::OutOfRange);
    }

    #[test]
    fn test_context_prices_accept_strings_and_numbers() {
        let mut raw = batch(45, 50);
        raw.market_context = Some(RawMarketContext {
            btc_price: json!(" 64000.5 "),
            eth_price: json!(3400),
            commentary: json!("Quiet"),
        });
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();
        assert_eq!(ingested.context.prices(), Some((dec!(64000.5), dec!(3400))));
        assert_eq!(ingested.context.commentary(), Some("Quiet"));
        assert!(ingested.warnings.is_empty());
    }

    #[test]
    fn test_malformed_context_fields_are_dropped() {
        let mut raw = batch(45, 50);
        raw.market_context = Some(RawMarketContext {
            btc_price: json!("abc"),
            eth_price: json!({ "usd": 3400 }),
            commentary: json!(42),
        });
        let ingested = ingest(&raw, &EngineConfig::default()).unwrap();

        assert_eq!(ingested.context, MarketContext::default());
        let fields: Vec<&str> = ingested.warnings.iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["btcPrice", "ethPrice", "commentary"]);
        assert!(ingested
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::Unparseable && w.substituted.is_none()));
        assert_eq!(
            ingested.warnings[0].to_string(),
            "reading[0].btcPrice malformed (\"abc\"), dropped"
        );
    }

    #[test]
    fn test_fallback_is_clamped_when_unvalidated() {
        let config = EngineConfig {
            fallback_integer_default: 250,
            ..EngineConfig::default()
        };
        let raw = RawBatch {
            readings: vec![
                RawReading::new("n/a", "Greed", "1718409600"),
                RawReading::new("70", "Greed", "1718323200"),
            ],
            market_context: None,
        };
        let ingested = ingest(&raw, &config).unwrap();
        assert_eq!(ingested.today.value, 100);
        assert_eq!(ingested.warnings[0].substituted, Some(100));
    }

    // ---------------------------------------------------------------------
    // Decision
    // ---------------------------------------------------------------------

    #[test]
    fn test_threshold_boundaries_inclusive() {
        let config = EngineConfig::default();

        let fear = AlertDecision::evaluate(20, 20, &config);
        assert!(fear.is_extreme_fear);
        assert!(!AlertDecision::evaluate(21, 21, &config).is_extreme_fear);

        let greed = AlertDecision::evaluate(80, 80, &config);
        assert!(greed.is_extreme_greed);
        assert!(!AlertDecision::evaluate(79, 79, &config).is_extreme_greed);

        assert!(AlertDecision::evaluate(50, 65, &config).is_significant_change);
        assert!(AlertDecision::evaluate(65, 50, &config).is_significant_change);
        assert!(!AlertDecision::evaluate(50, 64, &config).is_significant_change);
    }

    #[test]
    fn test_priority_fear_over_change() {
        let decision = AlertDecision::evaluate(15, 30, &EngineConfig::default());
        assert_eq!(decision.kind(), Some(AlertKind::ExtremeFear));
    }

    #[test]
    fn test_priority_greed_over_change() {
        let decision = AlertDecision::evaluate(85, 60, &EngineConfig::default());
        assert_eq!(decision.kind(), Some(AlertKind::ExtremeGreed));
    }

    #[test]
    fn test_priority_fear_over_greed_with_overlapping_thresholds() {
        // Not reachable through a validated config, but the ordering must still hold
        let config = EngineConfig {
            extreme_fear_threshold: 60,
            extreme_greed_threshold: 40,
            ..EngineConfig::default()
        };
        let decision = AlertDecision::evaluate(50, 50, &config);
        assert!(decision.is_extreme_fear && decision.is_extreme_greed);
        assert_eq!(decision.kind(), Some(AlertKind::ExtremeFear));
    }

    #[test]
    fn test_direction() {
        let config = EngineConfig::default();
        assert_eq!(AlertDecision::evaluate(50, 40, &config).direction(), Direction::Up);
        assert_eq!(AlertDecision::evaluate(40, 50, &config).direction(), Direction::Down);
        assert_eq!(AlertDecision::evaluate(50, 50, &config).direction(), Direction::Flat);
        assert_eq!(Direction::Flat.icon(), "➡️");
    }

    #[test]
    fn test_custom_thresholds() {
        let config = EngineConfig {
            extreme_fear_threshold: 25,
            extreme_greed_threshold: 75,
            significant_change_threshold: 5,
            ..EngineConfig::default()
        };
        let decision = AlertDecision::evaluate(25, 31, &config);
        assert!(decision.is_extreme_fear);
        assert!(decision.is_significant_change);
        assert!(AlertDecision::evaluate(75, 75, &config).is_extreme_greed);
    }

    // ---------------------------------------------------------------------
    // Sentiment
    // ---------------------------------------------------------------------

    #[test]
    fn test_sentiment_labels() {
        assert_eq!(Sentiment::from_label("Extreme Fear"), Sentiment::ExtremeFear);
        assert_eq!(Sentiment::from_label("extreme greed"), Sentiment::ExtremeGreed);
        assert_eq!(Sentiment::from_label(" Neutral "), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label("Mild Panic"), Sentiment::Other);
        assert_eq!(Sentiment::from_label("Mild Panic").icon(), "📊");
        assert_eq!(Sentiment::Greed.icon(), "🤑");
    }

    #[test]
    fn test_sentiment_bands() {
        assert_eq!(Sentiment::from_value(0), Sentiment::ExtremeFear);
        assert_eq!(Sentiment::from_value(20), Sentiment::ExtremeFear);
        assert_eq!(Sentiment::from_value(21), Sentiment::Fear);
        assert_eq!(Sentiment::from_value(60), Sentiment::Neutral);
        assert_eq!(Sentiment::from_value(80), Sentiment::Greed);
        assert_eq!(Sentiment::from_value(81), Sentiment::ExtremeGreed);
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec!(97123.456)), "97,123.46");
        assert_eq!(format_usd(dec!(97000)), "97,000");
        assert_eq!(format_usd(dec!(3500.50)), "3,500.5");
        assert_eq!(format_usd(dec!(999)), "999");
        assert_eq!(format_usd(dec!(1234567.005)), "1,234,567.01");
        assert_eq!(format_usd(dec!(0.5)), "0.5");
    }

    #[test]
    fn test_generated_at_uses_configured_zone() {
        let at = generated_at();
        assert_eq!(
            format_generated_at(at, chrono_tz::Asia::Seoul),
            "2024-06-15 09:00:00 KST"
        );
        assert_eq!(format_generated_at(at, chrono_tz::UTC), "2024-06-15 00:00:00 UTC");
    }

    #[test]
    fn test_render_empty_when_no_alert() {
        let ingested = ingest(&batch(50, 50), &EngineConfig::default()).unwrap();
        let decision = AlertDecision::evaluate(50, 50, &EngineConfig::default());
        let message = render_message(
            &decision,
            &ingested.today,
            &ingested.yesterday,
            &ingested.context,
            chrono_tz::Asia::Seoul,
            generated_at(),
        );
        assert!(message.is_empty());
    }

    #[test]
    fn test_partial_prices_suppress_price_line() {
        let mut raw = batch(15, 30);
        raw.market_context = Some(MarketContext {
            btc_price: Some(dec!(64000)),
            eth_price: None,
            commentary: None,
        }.into());
        let report = engine().process(&raw, generated_at()).unwrap();
        assert!(!report.message.contains("BTC"));
        assert_eq!(report.record.btc_price, Some(dec!(64000)));
    }

    #[test]
    fn test_commentary_block() {
        let mut raw = batch(15, 30);
        raw.market_context = Some(MarketContext {
            btc_price: None,
            eth_price: None,
            commentary: Some("Capitulation volume spiking".to_string()),
        }.into());
        let report = engine().process(&raw, generated_at()).unwrap();
        assert!(report.message.contains("🤖 *AI Market Insight*:"));
        assert!(report.message.contains("_Capitulation volume spiking_"));
    }

    #[test]
    fn test_markdown_in_free_text_is_escaped() {
        let mut raw = batch(15, 30);
        raw.readings[0].value_classification = Some("Extreme_Fear".to_string());
        raw.market_context = Some(MarketContext {
            btc_price: None,
            eth_price: None,
            commentary: Some("BTC_USD *pump*".to_string()),
        }.into());
        let report = engine().process(&raw, generated_at()).unwrap();

        assert!(report.message.contains("📊 Current index: *15* (Extreme\\_Fear)"));
        assert!(report.message.contains("\n_BTC_\\__USD _\\*_pump_\\*\n"));
        assert_eq!(report.record.classification, "Extreme_Fear");
        assert_eq!(report.record.commentary.as_deref(), Some("BTC_USD *pump*"));
    }

    #[test]
    fn test_escape_markdown() {
        use super::super::render::{escape_markdown, italic};

        assert_eq!(escape_markdown("Fear"), "Fear");
        assert_eq!(escape_markdown("a_b*c`d[e"), "a\\_b\\*c\\`d\\[e");
        assert_eq!(italic("calm"), "_calm_");
        assert_eq!(italic("*wow"), "\\*_wow_");
        assert_eq!(italic(""), "");
    }

    #[test]
    fn test_message_layout() {
        let report = engine().process(&batch(45, 62), generated_at()).unwrap();
        let lines: Vec<&str> = report.message.lines().collect();

        assert_eq!(lines[0], "⚡ *Sharp Move Detected*");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "😐 *Fear & Greed Index*");
        assert_eq!(lines[4], "📊 Current index: *45* (Neutral)");
        assert_eq!(lines[5], "📉 Change vs yesterday: *-17*");
        assert_eq!(lines[6], "📅 Yesterday: 62");
        assert_eq!(lines.last().copied(), Some("⏰ 2024-06-15 09:00:00 KST"));
    }

    // ---------------------------------------------------------------------
    // Scenarios
    // ---------------------------------------------------------------------

    #[test]
    fn test_scenario_extreme_fear_with_drop() {
        let report = engine().process(&batch(15, 30), generated_at()).unwrap();
        let a = report.analysis;

        assert_eq!(a.decision.change, -15);
        assert!(a.decision.is_extreme_fear);
        assert!(a.decision.is_significant_change);
        assert!(report.should_alert);
        assert_eq!(a.kind, Some(AlertKind::ExtremeFear));
        assert!(report.message.starts_with("🔥 *Extreme Fear = Buying Opportunity!*"));
        assert!(!report.message.contains("Sharp Move"));
    }

    #[test]
    fn test_scenario_flat_neutral() {
        let report = engine().process(&batch(50, 50), generated_at()).unwrap();
        let a = report.analysis;

        assert_eq!(a.decision.change, 0);
        assert!(!a.decision.is_extreme_fear);
        assert!(!a.decision.is_extreme_greed);
        assert!(!a.decision.is_significant_change);
        assert!(!report.should_alert);
        assert_eq!(report.message, "");
        assert_eq!(report.record.value, 50);
    }

    #[test]
    fn test_scenario_extreme_greed_with_prices() {
        let mut raw = batch(85, 60);
        raw.market_context = Some(MarketContext {
            btc_price: Some(dec!(104250.5)),
            eth_price: Some(dec!(3890)),
            commentary: None,
        }.into());
        let report = engine().process(&raw, generated_at()).unwrap();

        assert!(report.analysis.decision.is_extreme_greed);
        assert!(report.analysis.decision.is_significant_change);
        assert!(report.message.starts_with("⚠️ *Extreme Greed = Time to Take Profit!*"));
        assert!(report.message.contains("💰 *BTC*: $104,250.5 | *ETH*: $3,890"));
        assert!(report.message.contains("📈 Change vs yesterday: *+25*"));
    }

    #[test]
    fn test_scenario_significant_drop_only() {
        let report = engine().process(&batch(45, 62), generated_at()).unwrap();

        assert_eq!(report.analysis.decision.change, -17);
        assert!(report.analysis.decision.is_significant_change);
        assert!(!report.analysis.decision.is_extreme_fear);
        assert!(!report.analysis.decision.is_extreme_greed);
        assert_eq!(report.analysis.kind, Some(AlertKind::SignificantChange));
        assert!(report.message.contains("💡 Keep a close eye on market volatility"));
    }

    #[test]
    fn test_flat_change_renders_plus_zero() {
        // Extreme fear on a flat day still renders the change line
        let report = engine().process(&batch(10, 10), generated_at()).unwrap();
        assert!(report.message.contains("➡️ Change vs yesterday: *+0*"));
    }

    // ---------------------------------------------------------------------
    // Assembly & boundary
    // ---------------------------------------------------------------------

    #[test]
    fn test_record_contents() {
        let mut raw = batch(85, 60);
        raw.market_context = Some(MarketContext {
            btc_price: Some(dec!(104250.5)),
            eth_price: Some(dec!(3890)),
            commentary: Some("Euphoria".to_string()),
        }.into());
        let report = engine().process(&raw, generated_at()).unwrap();

        assert_eq!(
            report.record,
            PersistableRecord {
                value: 85,
                classification: "Extreme Greed".to_string(),
                timestamp_iso: "2024-06-15T00:00:00.000Z".to_string(),
                btc_price: Some(dec!(104250.5)),
                eth_price: Some(dec!(3890)),
                commentary: Some("Euphoria".to_string()),
            }
        );
    }

    #[test]
    fn test_record_serializes_to_output_contract() {
        let report = engine().process(&batch(50, 50), generated_at()).unwrap();
        let json = serde_json::to_value(&report.record).unwrap();

        assert_eq!(json["value"], 50);
        assert_eq!(json["classification"], "Neutral");
        assert_eq!(json["timestampIso"], "2024-06-15T00:00:00.000Z");
        assert!(json["btcPrice"].is_null());
        assert!(json["ethPrice"].is_null());
        assert!(json["commentary"].is_null());
    }

    #[test]
    fn test_idempotent_for_same_input() {
        let raw = batch(15, 30);
        let first = engine().process(&raw, generated_at()).unwrap();
        let second = engine().process(&raw, generated_at()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_only_stamp_differs_between_runs() {
        let raw = batch(15, 30);
        let first = engine().process(&raw, generated_at()).unwrap();
        let later = generated_at() + chrono::Duration::hours(1);
        let second = engine().process(&raw, later).unwrap();

        assert_eq!(first.record, second.record);
        assert_eq!(first.analysis, second.analysis);
        let strip = |m: &str| m.lines().filter(|l| !l.starts_with('⏰')).collect::<Vec<_>>().join("\n");
        assert_eq!(strip(&first.message), strip(&second.message));
        assert_ne!(first.message, second.message);
    }

    #[test]
    fn test_run_accepts_alternative_me_shape() {
        let input = json!({
            "data": [
                { "value": "15", "value_classification": "Extreme Fear", "timestamp": "1718409600" },
                { "value": "30", "value_classification": "Fear", "timestamp": "1718323200" }
            ],
            "marketContext": { "btcPrice": 64000.5, "ethPrice": 3400, "commentary": "Oversold" }
        });

        let outcome = engine().run(&input, generated_at());
        assert!(!outcome.is_failed());
        assert!(outcome.should_alert());
        assert!(outcome.message().contains("$64,000.5"));
        assert_eq!(outcome.record().unwrap().value, 15);
    }

    #[test]
    fn test_run_null_input_fails_softly() {
        let outcome = engine().run(&serde_json::Value::Null, generated_at());

        assert!(outcome.is_failed());
        assert!(!outcome.should_alert());
        assert_eq!(outcome.message(), "");
        assert!(outcome.record().is_none());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["failed"], true);
        assert_eq!(json["shouldAlert"], false);
        assert_eq!(json["message"], "");
        assert!(json["reason"].as_str().unwrap().contains("Invalid input"));
    }

    #[test]
    fn test_run_insufficient_data_reports_count() {
        let input = json!({ "readings": [ { "value": 40, "value_classification": "Fear", "timestamp": 1718409600 } ] });
        let outcome = engine().run(&input, generated_at());

        match outcome {
            CycleOutcome::Failed(failure) => {
                assert!(failure.failed);
                assert!(failure.reason.contains("got 1"));
                assert_eq!(failure.failed_at, generated_at());
            }
            CycleOutcome::Completed(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_run_missing_readings_is_insufficient() {
        let outcome = engine().run(&json!({}), generated_at());
        match outcome {
            CycleOutcome::Failed(failure) => assert!(failure.reason.contains("got 0")),
            CycleOutcome::Completed(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_run_batch_with_malformed_value_completes() {
        let raw = RawBatch {
            readings: vec![
                RawReading::new("abc", "Fear", "1718409600"),
                RawReading::new("30", "Fear", "1718323200"),
            ],
            market_context: None,
        };
        let outcome = engine().run_batch(&raw, generated_at());

        match outcome {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.record.value, 0);
                assert_eq!(report.warnings.len(), 1);
                // 0 is extreme fear under default thresholds
                assert!(report.should_alert);
            }
            CycleOutcome::Failed(f) => panic!("unexpected failure: {}", f.reason),
        }
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = engine().process(&batch(15, 30), generated_at()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["shouldAlert"], true);
        assert_eq!(json["analysis"]["todayValue"], 15);
        assert_eq!(json["analysis"]["yesterdayValue"], 30);
        assert_eq!(json["analysis"]["change"], -15);
        assert_eq!(json["analysis"]["isExtremeFear"], true);
        assert_eq!(json["analysis"]["kind"], "extreme_fear");
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = EngineConfig {
            extreme_fear_threshold: -1,
            ..EngineConfig::default()
        };
        assert!(AlertEngine::new(config).is_err());
    }

    #[test]
    fn test_engine_rejects_out_of_range_fallback() {
        let config = EngineConfig {
            fallback_integer_default: 250,
            ..EngineConfig::default()
        };
        let err = AlertEngine::new(config).unwrap_err();
        assert!(matches!(err, AlertError::Config(_)));
    }

    #[test]
    fn test_run_with_malformed_price_completes() {
        let input = json!({
            "data": [
                { "value": "15", "value_classification": "Extreme Fear", "timestamp": "1718409600" },
                { "value": "30", "value_classification": "Fear", "timestamp": "1718323200" }
            ],
            "marketContext": { "btcPrice": "abc", "ethPrice": 3400 }
        });

        match engine().run(&input, generated_at()) {
            CycleOutcome::Completed(report) => {
                assert!(report.should_alert);
                assert!(!report.message.contains("BTC"));
                assert_eq!(report.record.btc_price, None);
                assert_eq!(report.record.eth_price, Some(dec!(3400)));
                assert_eq!(report.warnings.len(), 1);
                assert_eq!(report.warnings[0].field, "btcPrice");
            }
            CycleOutcome::Failed(f) => panic!("unexpected failure: {}", f.reason),
        }
    }

    #[test]
    fn test_run_with_wrong_typed_context_completes() {
        let input = json!({
            "data": [
                { "value": 15, "value_classification": 7, "timestamp": 1718409600 },
                { "value": 30, "value_classification": "Fear", "timestamp": 1718323200 }
            ],
            "marketContext": { "btcPrice": [1], "ethPrice": true, "commentary": { "text": "hi" } }
        });

        match engine().run(&input, generated_at()) {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.record.classification, "7");
                assert_eq!(report.record.commentary, None);
                assert!(!report.message.contains("AI Market Insight"));
                assert_eq!(report.warnings.len(), 3);
            }
            CycleOutcome::Failed(f) => panic!("unexpected failure: {}", f.reason),
        }
    }

    #[test]
    fn test_run_with_non_object_context_completes() {
        let input = json!({
            "readings": [
                { "value": 15, "value_classification": "Extreme Fear", "timestamp": 1718409600 },
                { "value": 30, "value_classification": "Fear", "timestamp": 1718323200 }
            ],
            "marketContext": "unavailable"
        });

        match engine().run(&input, generated_at()) {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.record.btc_price, None);
                assert!(report.warnings.is_empty());
            }
            CycleOutcome::Failed(f) => panic!("unexpected failure: {}", f.reason),
        }
    }

    #[test]
    fn test_run_null_readings_fails_softly() {
        let outcome = engine().run(&json!({ "readings": null }), generated_at());
        assert!(outcome.is_failed());
        assert!(!outcome.should_alert());
        assert!(outcome.record().is_none());
    }
}
