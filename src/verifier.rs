//! Checking proofs.
//!
//! Each simulation is either opened or audited, as the challenge decides.
//! For an opened one the verifier never sees the hidden party. For the
//! others it opens their commitments and replays them gate by gate. A
//! party's replay only needs its own shares, its seed, and the public
//! broadcast values, which every party records in full. For an audited one
//! every party's seed is opened, and each triple is checked to multiply.
use tracing::{debug, instrument, Level};

use crate::bits::{Bit, BitBuf, BitVector};
use crate::circuit::{Operation, ValidatedCircuit};
use crate::commitment::{decommit, Commitment};
use crate::config::ProverConfig;
use crate::error::{CircuitError, Error};
use crate::gates::{and_share, not_share, ViewGrowth};
use crate::proof::{
    absorb_conclusion, absorb_simulation, start_transcript, Audit, Online, Proof, Response,
    Simulation, View,
};
use crate::sharing::{Shares, Triple, TripleShare};
use crate::transcript::Transcript;

/// Why a proof was rejected.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("malformed proof: {0}")]
    Shape(&'static str),
    #[error("output does not match the claim")]
    Output,
    #[error("simulation {simulation}: view commitment of party {party} does not open")]
    Commitment { simulation: usize, party: usize },
    #[error("simulation {simulation}: state commitment of party {party} does not open")]
    State { simulation: usize, party: usize },
    #[error("simulation {simulation}: views disagree on the broadcast of gate {gate}")]
    Broadcast { simulation: usize, gate: usize },
    #[error("simulation {simulation}: party {party} deviates at gate {gate}")]
    Replay {
        simulation: usize,
        party: usize,
        gate: usize,
    },
    #[error("simulation {simulation}: output shares of party {party} do not match its view")]
    OutputShares { simulation: usize, party: usize },
    #[error("simulation {simulation}: triple {triple} does not multiply")]
    Triple { simulation: usize, triple: usize },
    #[error("challenge does not match the transcript")]
    Challenge,
    #[error("simulation {simulation}: response does not follow the challenge")]
    Outcome { simulation: usize },
}

enum Failure {
    Rejected(Rejection),
    Error(Error),
}

impl From<Rejection> for Failure {
    fn from(r: Rejection) -> Self {
        Failure::Rejected(r)
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Failure::Error(e)
    }
}

fn ensure(condition: bool, rejection: Rejection) -> Result<(), Failure> {
    if condition {
        Ok(())
    } else {
        Err(rejection.into())
    }
}

/// What one party recorded for one non-linear gate.
struct Record {
    a: Bit,
    b: Bit,
    c: Bit,
    x: Bit,
    y: Bit,
    d: Shares,
    e: Shares,
}

impl Record {
    fn read(records: &BitBuf, index: usize, parties: usize) -> Option<Self> {
        let len = ViewGrowth::record_len(parties);
        let bits: Vec<Bit> = records.slice(index * len, len)?.iter().collect();
        Some(Self {
            a: bits[0],
            b: bits[1],
            c: bits[2],
            x: bits[3],
            y: bits[4],
            d: Shares::from_bits(&bits[5..5 + parties]),
            e: Shares::from_bits(&bits[5 + parties..]),
        })
    }

    fn opening_bits(&self) -> BitBuf {
        self.d.iter().chain(self.e.iter()).collect()
    }
}

/// Check that a proof convinces us that its prover knows an input for which
/// `circuit` produces `output`.
///
/// This returns `Ok(false)` for any proof which fails a check. Errors are
/// reserved for problems with the configuration or the circuit.
///
/// A prover can only get a false statement through by cheating in the
/// triples of simulations that escape the audit, and in the online phase
/// of the rest. See [`ProverConfig::for_security`] for how likely that is.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub fn verify(
    ctx: &[u8],
    config: &ProverConfig,
    circuit: &ValidatedCircuit,
    output: &BitVector,
    proof: &Proof,
) -> Result<bool, Error> {
    config.validate()?;
    match check(ctx, config, circuit, output, proof) {
        Ok(()) => Ok(true),
        Err(Failure::Rejected(rejection)) => {
            debug!(%rejection, "rejected proof");
            Ok(false)
        }
        Err(Failure::Error(e)) => Err(e),
    }
}

fn check(
    ctx: &[u8],
    config: &ProverConfig,
    circuit: &ValidatedCircuit,
    output: &BitVector,
    proof: &Proof,
) -> Result<(), Failure> {
    let n = config.parties;
    let block_size = config.compression.block_size;
    ensure(proof.output == *output, Rejection::Output)?;
    ensure(
        proof.simulations.len() == config.repetitions + config.audits,
        Rejection::Shape("simulation count"),
    )?;
    ensure(
        proof.challenge.len() == block_size,
        Rejection::Shape("challenge length"),
    )?;
    for simulation in &proof.simulations {
        check_shape(n, circuit, block_size, simulation)?;
    }

    let fresh = Transcript::for_config(config)?;
    let mut transcript = start_transcript(ctx, config, circuit)?;
    for (r, simulation) in proof.simulations.iter().enumerate() {
        let commitments = &simulation.state_commitments;
        let online_digest = match &simulation.response {
            Response::Online(online) => {
                check_online(circuit, n, r, commitments, online, output, fresh.clone())?
            }
            Response::Audit(audit) => {
                check_audit(circuit, r, commitments, audit)?;
                audit.online_digest.clone()
            }
        };
        absorb_simulation(&mut transcript, commitments, &online_digest)?;
    }

    let challenge = transcript.finalize()?;
    ensure(*challenge.material() == proof.challenge, Rejection::Challenge)?;
    let outcomes = challenge.outcomes(n, config.repetitions, config.audits)?;
    for (r, (simulation, outcome)) in proof.simulations.iter().zip(outcomes).enumerate() {
        ensure(
            simulation.outcome(n) == Some(outcome),
            Rejection::Outcome { simulation: r },
        )?;
    }
    Ok(())
}

/// Check an opened simulation, returning the digest of its online part.
fn check_online(
    circuit: &ValidatedCircuit,
    n: usize,
    simulation: usize,
    state_commitments: &[Commitment],
    online: &Online,
    output: &BitVector,
    mut transcript: Transcript,
) -> Result<BitVector, Failure> {
    let mut acc = BitVector::zeros(circuit.wire_out_count());
    for shares in &online.output_shares {
        acc ^= &BitVector::from(shares.clone());
    }
    ensure(acc == *output, Rejection::Output)?;

    for revealed in &online.revealed {
        let party = revealed.party;
        let opened = decommit(
            &revealed.view,
            &online.view_commitments[party],
            &revealed.decommitment,
        )?;
        ensure(opened, Rejection::Commitment { simulation, party })?;
        let opened = decommit(
            &revealed.state,
            &state_commitments[party],
            &revealed.state_decommitment,
        )?;
        ensure(opened, Rejection::State { simulation, party })?;
    }

    // Shapes are checked, so there is at least one revealed view.
    let first = &online.revealed[0].view;
    for gate in 0..circuit.nonlinear_gate_count() {
        let opening = Record::read(&first.records, gate, n)
            .ok_or(Rejection::Shape("record length"))?
            .opening_bits();
        for revealed in &online.revealed[1..] {
            let other = Record::read(&revealed.view.records, gate, n)
                .ok_or(Rejection::Shape("record length"))?;
            ensure(
                other.opening_bits() == opening,
                Rejection::Broadcast { simulation, gate },
            )?;
        }
        transcript.absorb(&opening)?;
    }

    for revealed in &online.revealed {
        let triples = revealed
            .state
            .triple_shares(revealed.party, circuit.nonlinear_gate_count())
            .ok_or(Rejection::Shape("corrections"))?;
        replay(
            circuit,
            n,
            simulation,
            revealed.party,
            &revealed.view,
            &triples,
            &online.output_shares[revealed.party],
        )?;
    }
    absorb_conclusion(
        &mut transcript,
        &online.output_shares,
        &online.view_commitments,
    )?;
    Ok(transcript.finalize()?.material().clone())
}

/// Check that every party's state opens, and that the triples they deal multiply.
fn check_audit(
    circuit: &ValidatedCircuit,
    simulation: usize,
    state_commitments: &[Commitment],
    audit: &Audit,
) -> Result<(), Failure> {
    let count = circuit.nonlinear_gate_count();
    let mut shares: Vec<Vec<TripleShare>> = Vec::with_capacity(audit.states.len());
    for (party, state) in audit.states.iter().enumerate() {
        let opened = decommit(
            state,
            &state_commitments[party],
            &audit.decommitments[party],
        )?;
        ensure(opened, Rejection::State { simulation, party })?;
        shares.push(
            state
                .triple_shares(party, count)
                .ok_or(Rejection::Shape("corrections"))?,
        );
    }
    for triple in 0..count {
        let dealt = Triple {
            a: shares.iter().map(|s| s[triple].a).collect(),
            b: shares.iter().map(|s| s[triple].b).collect(),
            c: shares.iter().map(|s| s[triple].c).collect(),
        };
        ensure(
            dealt.is_correct(),
            Rejection::Triple { simulation, triple },
        )?;
    }
    Ok(())
}

fn check_shape(
    n: usize,
    circuit: &ValidatedCircuit,
    block_size: usize,
    simulation: &Simulation,
) -> Result<(), Failure> {
    ensure(
        simulation.state_commitments.len() == n,
        Rejection::Shape("state commitment count"),
    )?;
    let online = match &simulation.response {
        Response::Online(online) => online,
        Response::Audit(audit) => {
            ensure(
                audit.states.len() == n && audit.decommitments.len() == n,
                Rejection::Shape("audited state count"),
            )?;
            return ensure(
                audit.online_digest.len() == block_size,
                Rejection::Shape("online digest length"),
            );
        }
    };
    ensure(
        online.output_shares.len() == n
            && online
                .output_shares
                .iter()
                .all(|s| s.len() == circuit.wire_out_count()),
        Rejection::Shape("output shares"),
    )?;
    ensure(
        online.view_commitments.len() == n,
        Rejection::Shape("view commitment count"),
    )?;
    ensure(
        online.revealed.len() == n - 1,
        Rejection::Shape("revealed view count"),
    )?;
    ensure(
        online.revealed.windows(2).all(|w| w[0].party < w[1].party)
            && online.revealed.iter().all(|r| r.party < n),
        Rejection::Shape("revealed parties"),
    )?;
    let records_len = circuit.nonlinear_gate_count() * ViewGrowth::record_len(n);
    ensure(
        online.revealed.iter().all(|r| {
            r.view.input.len() == circuit.wire_in_count() && r.view.records.len() == records_len
        }),
        Rejection::Shape("view length"),
    )
}

/// Run one party through the circuit, checking it against its own view.
///
/// `triples` holds the party's triple shares, replayed from its seed.
fn replay(
    circuit: &ValidatedCircuit,
    n: usize,
    simulation: usize,
    party: usize,
    view: &View,
    triples: &[TripleShare],
    output_shares: &BitBuf,
) -> Result<(), Failure> {
    let mut wires: Vec<Option<Bit>> = vec![None; circuit.wire_count()];
    for (slot, bit) in wires.iter_mut().zip(view.input.iter()) {
        *slot = Some(bit);
    }
    let read = |wires: &[Option<Bit>], wire: usize| {
        wires[wire].ok_or(Error::Circuit(CircuitError::UnassignedWire { wire }))
    };

    let mut next_record = 0;
    for (gate, g) in circuit.gates().iter().enumerate() {
        let x = read(&wires, g.inputs()[0])?;
        let y = match g.inputs().get(1) {
            Some(&w) => read(&wires, w)?,
            None => Bit::zero(),
        };
        let z = match g.operation() {
            Operation::Xor => x ^ y,
            Operation::Not => not_share(party, x),
            Operation::Identity => x,
            op @ (Operation::And | Operation::Or) => {
                let record = Record::read(&view.records, next_record, n)
                    .ok_or(Rejection::Shape("record length"))?;
                let dealt = triples
                    .get(next_record)
                    .ok_or(Rejection::Shape("triple count"))?;
                next_record += 1;
                let mismatch = Rejection::Replay {
                    simulation,
                    party,
                    gate,
                };
                ensure(
                    record.a == dealt.a
                        && record.b == dealt.b
                        && record.c == dealt.c
                        && record.x == x
                        && record.y == y
                        && record.d.get(party) == x ^ record.a
                        && record.e.get(party) == y ^ record.b,
                    mismatch,
                )?;
                let and = and_share(
                    party,
                    x,
                    y,
                    record.c,
                    record.d.reconstruct(),
                    record.e.reconstruct(),
                );
                if op == Operation::Or {
                    x ^ y ^ and
                } else {
                    and
                }
            }
        };
        wires[g.output()] = Some(z);
    }

    for (i, wire) in circuit.output_wires().enumerate() {
        ensure(
            output_shares.get(i) == Some(read(&wires, wire)?),
            Rejection::OutputShares { simulation, party },
        )?;
    }
    Ok(())
}
