//! Custom-CA verification against a real TLS handshake.
//!
//! # Design
//! `rcgen` mints a throwaway CA and a leaf for 127.0.0.1. A blocking `rustls`
//! server answers every request with a links document and counts the
//! requests that got past the handshake. CA bytes reach the client through an
//! in-memory `FileReader`, never the filesystem.

mod common;

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::capture_logs;
use flyte_client::{rel, ClientError, FileReader, FlyteClient, RetryPolicy, TrustConfig};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use url::Url;

struct Ca {
    pem: String,
    params: CertificateParams,
    key: KeyPair,
}

fn new_ca() -> Ca {
    let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "flyte test CA");
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    let cert = params.clone().self_signed(&key).unwrap();
    Ca {
        pem: cert.pem(),
        params,
        key,
    }
}

/// Leaf certificate for 127.0.0.1 signed by `ca`.
fn leaf_signed_by(ca: &Ca) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "127.0.0.1");
    params.distinguished_name = dn;
    params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let issuer = Issuer::from_params(&ca.params, &ca.key);
    let cert = params.signed_by(&key, &issuer).unwrap();
    (
        CertificateDer::from(cert.der().to_vec()),
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
    )
}

struct TlsServer {
    addr: SocketAddr,
    served: Arc<AtomicUsize>,
}

impl TlsServer {
    fn base_url(&self) -> Url {
        Url::parse(&format!("https://{}/v1", self.addr)).unwrap()
    }

    fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

fn start_tls_server(cert: CertificateDer<'static>, key: PrivateKeyDer<'static>) -> TlsServer {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let config = Arc::new(
        rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let config = config.clone();
            let counter = counter.clone();
            thread::spawn(move || serve_links(config, stream, addr, &counter));
        }
    });

    TlsServer { addr, served }
}

fn serve_links(
    config: Arc<rustls::ServerConfig>,
    stream: TcpStream,
    addr: SocketAddr,
    served: &AtomicUsize,
) {
    let Ok(conn) = rustls::ServerConnection::new(config) else {
        return;
    };
    let mut tls = rustls::StreamOwned::new(conn, stream);

    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match tls.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
    served.fetch_add(1, Ordering::SeqCst);

    let body = format!(
        r#"{{"links":[{{"href":"https://{addr}/v1/health","rel":"health"}}]}}"#
    );
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = tls.write_all(response.as_bytes());
    tls.conn.send_close_notify();
    let _ = tls.flush();
}

/// Serves one PEM document for any path.
struct PemReader(String);

impl FileReader for PemReader {
    fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
        Ok(self.0.clone().into_bytes())
    }
}

fn bounded() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(20)).with_max_attempts(2)
}

#[test]
fn custom_ca_verifies_server_signed_by_it() {
    let ca = new_ca();
    let (cert, key) = leaf_signed_by(&ca);
    let server = start_tls_server(cert, key);

    let client = FlyteClient::builder(server.base_url())
        .timeout(Duration::from_secs(5))
        .trust(TrustConfig::CustomCa(PathBuf::from("ca.pem")))
        .retry_policy(bounded())
        .connect_with_reader(&PemReader(ca.pem.clone()))
        .unwrap();

    assert_eq!(server.served(), 1);
    assert_eq!(
        client.resolve(rel::HEALTH).unwrap().as_str(),
        format!("https://{}/v1/health", server.addr)
    );
}

#[test]
fn custom_ca_rejects_server_signed_by_another_ca() {
    let trusted = new_ca();
    let other = new_ca();
    let (cert, key) = leaf_signed_by(&other);
    let server = start_tls_server(cert, key);

    let (result, logs) = capture_logs(|| {
        FlyteClient::builder(server.base_url())
            .timeout(Duration::from_secs(5))
            .trust(TrustConfig::CustomCa(PathBuf::from("ca.pem")))
            .retry_policy(bounded())
            .connect_with_reader(&PemReader(trusted.pem.clone()))
    });

    match result.unwrap_err() {
        ClientError::AttemptsExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, ClientError::Transport { .. }), "{last}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(logs.contains("cannot get api links"), "logs: {logs}");
    assert_eq!(server.served(), 0, "no request may pass an unverified handshake");
}

#[test]
fn system_roots_reject_private_ca() {
    let ca = new_ca();
    let (cert, key) = leaf_signed_by(&ca);
    let server = start_tls_server(cert, key);

    let err = FlyteClient::builder(server.base_url())
        .timeout(Duration::from_secs(5))
        .trust(TrustConfig::SystemRoots)
        .retry_policy(bounded())
        .connect()
        .unwrap_err();

    assert!(matches!(err, ClientError::AttemptsExhausted { .. }));
    assert_eq!(server.served(), 0);
}

#[test]
fn insecure_mode_skips_verification() {
    let ca = new_ca();
    let (cert, key) = leaf_signed_by(&ca);
    let server = start_tls_server(cert, key);

    let client = FlyteClient::builder(server.base_url())
        .timeout(Duration::from_secs(5))
        .insecure()
        .retry_policy(bounded())
        .connect()
        .unwrap();

    assert_eq!(server.served(), 1);
    assert!(client.health_check_url().is_ok());
}

#[test]
fn garbage_inside_pem_block_fails_before_bootstrap() {
    let ca = new_ca();
    let (cert, key) = leaf_signed_by(&ca);
    let server = start_tls_server(cert, key);
    let garbage = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";

    // Default policy retries forever, so returning at all means no bootstrap ran.
    let err = FlyteClient::builder(server.base_url())
        .trust(TrustConfig::CustomCa(PathBuf::from("ca.pem")))
        .connect_with_reader(&PemReader(garbage.to_string()))
        .unwrap_err();

    assert!(matches!(err, ClientError::CaCertificate { .. }), "{err}");
    assert_eq!(server.served(), 0);
}
