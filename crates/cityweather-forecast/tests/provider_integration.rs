//! Integration tests for ForecastProvider using wiremock.
//!
//! These tests run the full fetch-then-parse pipeline against a mock of the
//! `getWeatherbyCityName` endpoint.

use std::time::Duration;

use cityweather_core::{ForecastConfig, NetworkError};
use cityweather_forecast::{
    CancellationToken, ForecastError, ForecastProvider, RetryConfig, NO_DATA,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/WebServices/WeatherWebService.asmx/getWeatherbyCityName";

/// Build an `ArrayOfString` body with the given values.
fn array_of_string(values: &[String]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
         <ArrayOfString xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" xmlns=\"http://WebXml.com.cn/\">\r\n",
    );
    for value in values {
        body.push_str(&format!("  <string>{}</string>\r\n", value));
    }
    body.push_str("</ArrayOfString>");
    body
}

/// Twenty fields with a recognizable value at each index.
fn beijing_fields() -> Vec<String> {
    let mut fields: Vec<String> = (0..20).map(|i| format!("field-{}", i)).collect();
    fields[1] = "Beijing".to_string();
    fields[3] = "54511.jpg".to_string();
    fields[4] = "2024-01-15 10:30:00".to_string();
    fields[5] = "-6℃/3℃".to_string();
    fields[6] = "1月15日 晴".to_string();
    fields[7] = "北风3-4级".to_string();
    fields[12] = "1月16日 多云".to_string();
    fields[13] = "-5℃/4℃".to_string();
    fields[17] = "1月17日 阴".to_string();
    fields[18] = "-4℃/2℃".to_string();
    fields
}

fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/xml; charset=utf-8")
}

fn provider_for(server: &MockServer) -> ForecastProvider {
    provider_with(server, |_| {})
}

fn provider_with(server: &MockServer, tweak: impl FnOnce(&mut ForecastConfig)) -> ForecastProvider {
    let mut config = ForecastConfig {
        service_url: format!("{}{}", server.uri(), ENDPOINT),
        timeout_secs: 5,
        ..ForecastConfig::default()
    };
    tweak(&mut config);
    ForecastProvider::new(&config).unwrap()
}

#[tokio::test]
async fn test_get_forecast_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("theCityName", "Beijing"))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let forecast = provider.get_forecast("Beijing").await.unwrap();

    assert_eq!(forecast.city(), "Beijing");
    assert_eq!(forecast.icon_file_name(), "54511.jpg");
    assert_eq!(forecast.updated_at(), "2024-01-15 10:30:00");
    assert_eq!(forecast.temperature(), "-6℃/3℃");
    assert_eq!(forecast.condition(), "1月15日 晴");
    assert_eq!(forecast.wind(), "北风3-4级");
    assert_eq!(forecast.tomorrow(), "1月16日 多云 -5℃/4℃");
    assert_eq!(forecast.day_after_tomorrow(), "1月17日 阴 -4℃/2℃");
}

#[tokio::test]
async fn test_non_ascii_place_is_url_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("theCityName", "北京"))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    assert!(provider.get_forecast("北京").await.is_ok());
}

#[tokio::test]
async fn test_fetch_returns_body_verbatim() {
    let mock_server = MockServer::start().await;
    let body = array_of_string(&beijing_fields());

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response(body.clone()))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let raw = provider.fetch("Beijing").await.unwrap();
    assert_eq!(raw.as_str(), body);
}

#[tokio::test]
async fn test_short_response_uses_sentinel() {
    let mock_server = MockServer::start().await;
    let fields: Vec<String> = beijing_fields().into_iter().take(15).collect();

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response(array_of_string(&fields)))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let forecast = provider.get_forecast("Beijing").await.unwrap();

    assert_eq!(forecast.day_after_tomorrow(), NO_DATA);
    assert_eq!(forecast.tomorrow(), "1月16日 多云 -5℃/4℃");
}

#[tokio::test]
async fn test_unknown_city_is_insufficient_fields() {
    let mock_server = MockServer::start().await;
    // The service answers unknown names with a near-empty array.
    let fields = vec!["查询结果为空！".to_string()];

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response(array_of_string(&fields)))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.get_forecast("Atlantis").await.unwrap_err();

    match err {
        ForecastError::Parse(failure) => {
            assert_eq!(failure.reason(), "insufficient-fields");
            assert!(failure.to_string().contains("got 1"));
        }
        other => panic!("expected parse failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response("<ArrayOfString><string>Beijing".to_string()))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.get_forecast("Beijing").await.unwrap_err();

    assert!(
        matches!(&err, ForecastError::Parse(f) if f.reason() == "malformed-xml"),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_server_error_is_network_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("soap:Server"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.get_forecast("Beijing").await.unwrap_err();

    assert!(
        matches!(err, ForecastError::Network(NetworkError::ServerError { status: 500, .. })),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_invalid_utf8_is_network_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x3c, 0xff, 0xfe, 0x3e], "text/xml"))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.get_forecast("Beijing").await.unwrap_err();

    assert!(
        matches!(err, ForecastError::Network(NetworkError::InvalidResponse(_))),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ForecastConfig {
        service_url: format!("http://127.0.0.1:{}{}", port, ENDPOINT),
        timeout_secs: 5,
        ..ForecastConfig::default()
    };
    let provider = ForecastProvider::new(&config).unwrap();

    let err = provider.get_forecast("Beijing").await.unwrap_err();
    assert!(
        matches!(err, ForecastError::Network(NetworkError::ConnectionFailed(_))),
        "unexpected error: {:?}",
        err
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_network_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            xml_response(array_of_string(&beijing_fields())).set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let provider = provider_with(&mock_server, |c| c.timeout_secs = 1);
    let err = provider.get_forecast("Beijing").await.unwrap_err();

    assert!(
        matches!(err, ForecastError::Network(NetworkError::Timeout)),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_empty_place_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .expect(0)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.get_forecast("").await.unwrap_err();

    assert!(matches!(err, ForecastError::EmptyInput));
    mock_server.verify().await;
}

#[tokio::test]
async fn test_single_attempt_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    assert!(provider.get_forecast("Beijing").await.is_err());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_opt_in_retry_recovers_from_503() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).with_retry(RetryConfig::new(2, 10, 50));
    let forecast = provider.get_forecast("Beijing").await.unwrap();

    assert_eq!(forecast.city(), "Beijing");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).with_retry(RetryConfig::new(3, 10, 50));
    let err = provider.get_forecast("Beijing").await.unwrap_err();

    assert!(matches!(
        err,
        ForecastError::Network(NetworkError::ServerError { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            xml_response(array_of_string(&beijing_fields())).set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = provider
        .get_forecast_cancellable("Beijing", &token)
        .await
        .unwrap_err();

    assert!(matches!(err, ForecastError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_concurrent_queries_are_independent() {
    let mock_server = MockServer::start().await;

    let mut shanghai = beijing_fields();
    shanghai[1] = "Shanghai".to_string();

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("theCityName", "Beijing"))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("theCityName", "Shanghai"))
        .respond_with(xml_response(array_of_string(&shanghai)))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let (a, b) = tokio::join!(
        provider.get_forecast("Beijing"),
        provider.get_forecast("Shanghai")
    );

    assert_eq!(a.unwrap().city(), "Beijing");
    assert_eq!(b.unwrap().city(), "Shanghai");
}

#[tokio::test]
async fn test_forecast_serializes_to_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(xml_response(array_of_string(&beijing_fields())))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let forecast = provider.get_forecast("Beijing").await.unwrap();
    let json = serde_json::to_value(&forecast).unwrap();

    assert_eq!(json["city"], "Beijing");
    assert_eq!(json["day_after_tomorrow"], "1月17日 阴 -4℃/2℃");
}
