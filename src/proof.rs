use bincode::{config, Decode, Encode};
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, instrument, Level};

use crate::bits::{BitBuf, BitVector};
use crate::circuit::ValidatedCircuit;
use crate::commitment::{commit, Commitment, Decommitment};
use crate::config::ProverConfig;
use crate::constants::MAX_PROOF_BYTES;
use crate::error::{CircuitError, Error};
use crate::gates::{GateEmulator, ViewGrowth};
use crate::rng::{BitPRNG, BitRng, Seed};
use crate::sharing::{share, Shares, Triple, TripleShare};
use crate::transcript::{Outcome, Transcript};

/// What a party starts a simulation with, before seeing any input.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PartyState {
    /// Where the party's triple shares are drawn from.
    pub seed: Seed,
    /// Party 0's share of `c` in every triple, in gate order. Empty for other parties.
    pub corrections: BitBuf,
}

impl PartyState {
    /// Replay the shares `party` holds of each of `count` triples.
    ///
    /// Returns `None` if the corrections don't fit `party` and `count`.
    pub fn triple_shares(&self, party: usize, count: usize) -> Option<Vec<TripleShare>> {
        let expected = if party == 0 { count } else { 0 };
        if self.corrections.len() != expected {
            return None;
        }
        let mut rng = BitPRNG::seeded(&self.seed);
        let shares = (0..count)
            .map(|i| {
                let correction = self.corrections.get(i).unwrap_or_default();
                TripleShare::draw(&mut rng, party, correction)
            })
            .collect();
        Some(shares)
    }
}

/// Represents the view of a single party in the MPC protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct View {
    /// The party's share of each input wire.
    pub input: BitBuf,
    /// One record per non-linear gate, laid out as in [`ViewGrowth::party_record`].
    pub records: BitBuf,
}

impl View {
    /// The input shares followed by the records.
    pub fn to_bits(&self) -> BitBuf {
        self.input.iter().chain(self.records.iter()).collect()
    }
}

/// A party which has been opened to the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RevealedView {
    pub party: usize,
    pub state: PartyState,
    pub state_decommitment: Decommitment,
    pub view: View,
    pub decommitment: Decommitment,
}

/// The opened part of a simulation the challenge did not audit.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Online {
    /// Every party's share of the output wires.
    pub output_shares: Vec<BitBuf>,
    /// A commitment to every party's view.
    pub view_commitments: Vec<Commitment>,
    /// All parties but the hidden one, by increasing party index.
    pub revealed: Vec<RevealedView>,
}

impl Online {
    /// The first party whose view was not revealed.
    pub fn hidden_party(&self, parties: usize) -> Option<usize> {
        (0..parties).find(|i| self.revealed.iter().all(|r| r.party != *i))
    }
}

/// The opened part of an audited simulation.
///
/// Every party's state is revealed, so the views must stay closed: they
/// would give away the input.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Audit {
    pub states: Vec<PartyState>,
    pub decommitments: Vec<Decommitment>,
    /// The compressed broadcasts, output shares and view commitments of the simulation.
    pub online_digest: BitVector,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Response {
    Online(Online),
    Audit(Audit),
}

/// One independent run of the simulated protocol.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Simulation {
    /// A commitment to every party's starting state.
    pub state_commitments: Vec<Commitment>,
    pub response: Response,
}

impl Simulation {
    pub fn online(&self) -> Option<&Online> {
        match &self.response {
            Response::Online(online) => Some(online),
            Response::Audit(_) => None,
        }
    }

    pub fn audit(&self) -> Option<&Audit> {
        match &self.response {
            Response::Audit(audit) => Some(audit),
            Response::Online(_) => None,
        }
    }

    /// What the challenge asked of this simulation, judging by the response.
    pub fn outcome(&self, parties: usize) -> Option<Outcome> {
        match &self.response {
            Response::Online(online) => online.hidden_party(parties).map(Outcome::Hide),
            Response::Audit(_) => Some(Outcome::Audit),
        }
    }
}

/// A proof that the prover knows an input producing some output.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Proof {
    /// The reconstructed output of the circuit.
    pub output: BitVector,
    /// The opened and the audited simulations, in the order they were run.
    pub simulations: Vec<Simulation>,
    /// The final transcript accumulator the outcomes were derived from.
    pub challenge: BitVector,
}

impl Proof {
    /// The length of [`Proof::to_bits`] for a given configuration and circuit.
    pub fn bit_len(config: &ProverConfig, circuit: &ValidatedCircuit) -> Result<usize, Error> {
        config.validate()?;
        let view_len = circuit.wire_in_count()
            + circuit.nonlinear_gate_count() * ViewGrowth::record_len(config.parties);
        Ok(circuit.wire_out_count()
            + config.repetitions * (config.parties - 1) * view_len
            + config.compression.block_size)
    }

    /// Flatten the proof as `output ‖ revealed views ‖ challenge`.
    ///
    /// Only the views of opened simulations appear. Commitments, states and
    /// output shares are left out; use [`Proof::to_bytes`] for something
    /// that can be verified.
    pub fn to_bits(&self) -> BitBuf {
        let mut out: BitBuf = self.output.iter().collect();
        for online in self.simulations.iter().filter_map(Simulation::online) {
            for revealed in &online.revealed {
                out.extend(revealed.view.to_bits().iter());
            }
        }
        out.extend(self.challenge.iter());
        out
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(bincode::encode_to_vec(self, config::standard())?)
    }

    /// Decode a proof, refusing anything claiming more than [`MAX_PROOF_BYTES`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > MAX_PROOF_BYTES {
            return Err(Error::Encoding(format!(
                "proof of {} bytes is over the limit",
                bytes.len()
            )));
        }
        let mut reader = bytes;
        let proof: Proof = bincode::decode_from_std_read(
            &mut reader,
            config::standard().with_limit::<MAX_PROOF_BYTES>(),
        )?;
        if !reader.is_empty() {
            return Err(Error::Encoding("trailing bytes after proof".to_owned()));
        }
        if !proof.is_well_formed() {
            return Err(Error::Encoding("malformed bit vector in proof".to_owned()));
        }
        Ok(proof)
    }

    fn is_well_formed(&self) -> bool {
        self.output.is_well_formed()
            && self.challenge.is_well_formed()
            && self.simulations.iter().all(|s| match &s.response {
                Response::Online(online) => {
                    online.output_shares.iter().all(BitBuf::is_well_formed)
                        && online.revealed.iter().all(|v| {
                            v.state.corrections.is_well_formed()
                                && v.view.input.is_well_formed()
                                && v.view.records.is_well_formed()
                        })
                }
                Response::Audit(audit) => {
                    audit.online_digest.is_well_formed()
                        && audit.states.iter().all(|s| s.corrections.is_well_formed())
                }
            })
    }
}

/// Start a transcript, binding everything public about the statement.
pub(crate) fn start_transcript(
    ctx: &[u8],
    config: &ProverConfig,
    circuit: &ValidatedCircuit,
) -> Result<Transcript, Error> {
    let mut transcript = Transcript::for_config(config)?;
    transcript.absorb_u64(ctx.len() as u64)?;
    transcript.absorb_bytes(ctx)?;
    transcript.absorb_u64(config.parties as u64)?;
    transcript.absorb_u64(config.repetitions as u64)?;
    transcript.absorb_u64(config.audits as u64)?;
    let params = config.compression;
    for v in [
        params.block_size,
        params.key_size,
        params.num_sboxes,
        params.rounds,
    ] {
        transcript.absorb_u64(v as u64)?;
    }
    transcript.absorb_bytes(&circuit.digest()?)?;
    Ok(transcript)
}

/// Absorb what closes the online part of a simulation: output shares, then view commitments.
pub(crate) fn absorb_conclusion(
    transcript: &mut Transcript,
    output_shares: &[BitBuf],
    commitments: &[Commitment],
) -> Result<(), Error> {
    for shares in output_shares {
        transcript.absorb(shares)?;
    }
    for commitment in commitments {
        transcript.absorb(&commitment.to_bits())?;
    }
    Ok(())
}

/// Absorb one simulation into the main transcript: state commitments, then the online digest.
pub(crate) fn absorb_simulation(
    transcript: &mut Transcript,
    state_commitments: &[Commitment],
    online_digest: &BitVector,
) -> Result<(), Error> {
    for commitment in state_commitments {
        transcript.absorb(&commitment.to_bits())?;
    }
    transcript.absorb(&online_digest.into())
}

fn commit_all<T: Encode, R: RngCore + CryptoRng>(
    rng: &mut R,
    values: &[T],
) -> Result<(Vec<Commitment>, Vec<Decommitment>), Error> {
    let pairs = values
        .iter()
        .map(|v| commit(rng, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairs.into_iter().unzip())
}

struct Run {
    views: Vec<View>,
    output_shares: Vec<BitBuf>,
    /// Party 0's share of `c` in every triple.
    corrections: BitBuf,
}

/// Runs a circuit over shared wires, for every party at once.
struct Simulator {
    /// Each party's own stream, for its triple shares.
    dealers: Vec<BitPRNG>,
    emulator: GateEmulator,
    wires: Vec<Option<Shares>>,
    views: Vec<View>,
}

impl Simulator {
    /// Create a new simulator, initialized with some secret input.
    ///
    /// Input shares come from `rng`, triple shares from each party's seed.
    fn create<R: RngCore + CryptoRng>(
        rng: &mut BitRng<R>,
        seeds: &[Seed],
        emulator: GateEmulator,
        circuit: &ValidatedCircuit,
        input: &BitVector,
    ) -> Result<Self, Error> {
        let n = emulator.parties();
        let mut views = vec![View::default(); n];
        let mut wires = vec![None; circuit.wire_count()];
        for (slot, bit) in wires.iter_mut().zip(input.iter()) {
            let shares = share(rng, bit, n)?;
            for (view, s) in views.iter_mut().zip(shares.iter()) {
                view.input.push(s);
            }
            *slot = Some(shares);
        }
        Ok(Self {
            dealers: seeds.iter().map(BitPRNG::seeded).collect(),
            emulator,
            wires,
            views,
        })
    }

    fn read(&self, wire: usize) -> Result<&Shares, Error> {
        self.wires[wire]
            .as_ref()
            .ok_or(Error::Circuit(CircuitError::UnassignedWire { wire }))
    }

    /// Run every gate, feeding the broadcast of each non-linear gate to `online`.
    fn run(
        mut self,
        circuit: &ValidatedCircuit,
        online: &mut Transcript,
        on_triple: &mut dyn FnMut(&mut Triple),
    ) -> Result<Run, Error> {
        let n = self.emulator.parties();
        let mut corrections = BitBuf::new();
        for gate in circuit.gates() {
            let triple = if gate.operation().is_nonlinear() {
                let mut triple = Triple::deal(&mut self.dealers)?;
                on_triple(&mut triple);
                corrections.push(triple.c.get(0));
                Some(triple)
            } else {
                None
            };
            let inputs = gate
                .inputs()
                .iter()
                .map(|&w| self.read(w))
                .collect::<Result<Vec<_>, _>>()?;
            let step = self.emulator.emulate(gate.operation(), &inputs, triple)?;
            if let Some(growth) = &step.growth {
                for (i, view) in self.views.iter_mut().enumerate() {
                    view.records.extend(growth.party_record(i).iter());
                }
                online.absorb(&growth.opening.bits())?;
            }
            self.wires[gate.output()] = Some(step.output);
        }
        let output_shares = (0..n)
            .map(|i| {
                circuit
                    .output_wires()
                    .map(|w| self.read(w).map(|s| s.get(i)))
                    .collect::<Result<BitBuf, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Run {
            views: self.views,
            output_shares,
            corrections,
        })
    }
}

/// Everything the prover holds about one simulation until the challenge is known.
struct Pending {
    states: Vec<PartyState>,
    state_commitments: Vec<Commitment>,
    state_decommitments: Vec<Decommitment>,
    views: Vec<View>,
    view_commitments: Vec<Commitment>,
    view_decommitments: Vec<Decommitment>,
    output_shares: Vec<BitBuf>,
    online_digest: BitVector,
}

impl Pending {
    fn respond(self, outcome: Outcome) -> Simulation {
        let response = match outcome {
            Outcome::Audit => Response::Audit(Audit {
                states: self.states,
                decommitments: self.state_decommitments,
                online_digest: self.online_digest,
            }),
            Outcome::Hide(hidden) => {
                let parties = self
                    .states
                    .into_iter()
                    .zip(self.state_decommitments)
                    .zip(self.views.into_iter().zip(self.view_decommitments));
                let revealed = parties
                    .enumerate()
                    .filter(|(party, _)| *party != hidden)
                    .map(|(party, ((state, state_decommitment), (view, decommitment)))| {
                        RevealedView {
                            party,
                            state,
                            state_decommitment,
                            view,
                            decommitment,
                        }
                    })
                    .collect();
                Response::Online(Online {
                    output_shares: self.output_shares,
                    view_commitments: self.view_commitments,
                    revealed,
                })
            }
        };
        Simulation {
            state_commitments: self.state_commitments,
            response,
        }
    }
}

/// Prove knowledge of `input`, such that `circuit` maps it to the returned output.
///
/// The context `ctx` is bound into the proof, which will only verify with the
/// same context.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub fn prove<R: RngCore + CryptoRng>(
    rng: &mut R,
    ctx: &[u8],
    config: &ProverConfig,
    circuit: &ValidatedCircuit,
    input: &BitVector,
) -> Result<Proof, Error> {
    prove_with(rng, ctx, config, circuit, input, &mut |_: &mut Triple| {})
}

/// Like [`prove`], handing every dealt triple to `on_triple` before it is used.
pub(crate) fn prove_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    ctx: &[u8],
    config: &ProverConfig,
    circuit: &ValidatedCircuit,
    input: &BitVector,
    on_triple: &mut dyn FnMut(&mut Triple),
) -> Result<Proof, Error> {
    config.validate()?;
    if input.len() != circuit.wire_in_count() {
        return Err(Error::InputLength {
            expected: circuit.wire_in_count(),
            actual: input.len(),
        });
    }
    let output = circuit.evaluate(input)?;

    let n = config.parties;
    let emulator = GateEmulator::new(n)?;
    let mut rng = BitRng::new(rng);
    let mut transcript = start_transcript(ctx, config, circuit)?;
    let fresh = Transcript::for_config(config)?;

    let instances = config.repetitions + config.audits;
    let mut pending = Vec::with_capacity(instances);
    for instance in 0..instances {
        let seeds: Vec<Seed> = (0..n).map(|_| Seed::random(rng.inner())).collect();
        let mut online = fresh.clone();
        let mut run = Simulator::create(&mut rng, &seeds, emulator, circuit, input)?.run(
            circuit,
            &mut online,
            &mut *on_triple,
        )?;

        let states: Vec<PartyState> = seeds
            .into_iter()
            .enumerate()
            .map(|(party, seed)| PartyState {
                seed,
                corrections: if party == 0 {
                    std::mem::take(&mut run.corrections)
                } else {
                    BitBuf::new()
                },
            })
            .collect();
        let (state_commitments, state_decommitments) = commit_all(rng.inner(), &states)?;
        let (view_commitments, view_decommitments) = commit_all(rng.inner(), &run.views)?;
        absorb_conclusion(&mut online, &run.output_shares, &view_commitments)?;
        let online_digest = online.finalize()?.material().clone();
        absorb_simulation(&mut transcript, &state_commitments, &online_digest)?;
        debug!(instance, "committed to simulation");

        pending.push(Pending {
            states,
            state_commitments,
            state_decommitments,
            views: run.views,
            view_commitments,
            view_decommitments,
            output_shares: run.output_shares,
            online_digest,
        });
    }

    let challenge = transcript.finalize()?;
    let outcomes = challenge.outcomes(n, config.repetitions, config.audits)?;
    debug!(?outcomes, "derived outcomes");

    let simulations = pending
        .into_iter()
        .zip(outcomes)
        .map(|(pending, outcome)| pending.respond(outcome))
        .collect();

    Ok(Proof {
        output,
        simulations,
        challenge: challenge.material().clone(),
    })
}
