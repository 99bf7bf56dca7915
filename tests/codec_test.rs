//! Round-trip and authentication properties of the wire codec (spec §8).

use luxdb::codec::{self, Command, CommandResult, CommandState, ResultData};
use luxdb::crypto::{derive_key, Token};
use luxdb::error::TransportError;

fn token(secret: &str) -> Token {
    Token::new(derive_key(secret, b"codec-test-salt", 50), 60)
}

#[test]
fn command_round_trip_preserves_value() {
    let t = token("s3cr3t");
    let cmd = Command::AddItems {
        name: "idx".into(),
        data: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        ids: vec![10, 20],
    };
    let wire = codec::encode(&cmd, &t).unwrap();
    let back: Command = codec::decode(&wire, &t).unwrap();

    match back {
        Command::AddItems { name, data, ids } => {
            assert_eq!(name, "idx");
            assert_eq!(data, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
            assert_eq!(ids, vec![10, 20]);
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn wrong_secret_fails_with_invalid_token() {
    let sender = token("s3cr3t");
    let receiver = token("not-the-secret");

    let cmd = Command::GetIndexes;
    let wire = codec::encode(&cmd, &sender).unwrap();
    let err = codec::decode::<Command>(&wire, &receiver).unwrap_err();
    assert!(matches!(err, TransportError::InvalidToken));
}

#[test]
fn elapsed_ttl_fails_with_invalid_token() {
    let key = derive_key("s3cr3t", b"codec-test-salt", 50);
    let sender = Token::new(key, 1);
    let cmd = Command::GetIndexes;
    let wire = codec::encode(&cmd, &sender).unwrap();

    // Force the TTL to have elapsed without sleeping: rebuild with a
    // zero-second TTL on the receiving side against an already-sealed token.
    std::thread::sleep(std::time::Duration::from_secs(2));
    let receiver = Token::new(key, 1);
    let err = codec::decode::<Command>(&wire, &receiver).unwrap_err();
    assert!(matches!(err, TransportError::InvalidToken));
}

#[test]
fn failed_result_round_trips_with_error_payload() {
    let t = token("s3cr3t");
    let result = CommandResult::failed(luxdb::error::LuxError::IndexDoesNotExist("idx".into()));
    let wire = codec::encode(&result, &t).unwrap();
    let back: CommandResult = codec::decode(&wire, &t).unwrap();

    assert_eq!(back.state, CommandState::Failed);
    match back.data {
        ResultData::Error(luxdb::error::LuxError::IndexDoesNotExist(name)) => assert_eq!(name, "idx"),
        other => panic!("wrong variant: {other:?}"),
    }
}
